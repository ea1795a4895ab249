//! ABCD axes and region windows.

use std::fmt;

use abcd_core::{Axis, AxisKind, Error, Histogram, Result};

/// Candidate names of the ABCD x axis, in lookup order.
pub const X_AXES: [&str; 2] = ["mt", "passMT"];

/// Candidate names of the ABCD y axis, in lookup order.
pub const Y_AXES: [&str; 4] = ["iso", "relIso", "dxy", "passIso"];

/// A slice of one ABCD axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Window {
    /// Signal-like values.
    Signal,
    /// Sideband adjacent to the signal window.
    Sideband,
    /// Second sideband, further away from the signal.
    FarSideband,
}

/// Named ABCD regions as `(x window, y window)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    /// Signal region.
    D,
    /// Both axes in the sideband.
    A,
    /// x sideband, y signal.
    B,
    /// x signal, y sideband.
    C,
    /// x far sideband, y sideband.
    Ax,
    /// x far sideband, y signal.
    Bx,
    /// x sideband, y far sideband.
    Ay,
    /// x signal, y far sideband.
    Cy,
    /// Both axes in the far sideband.
    Axy,
}

impl Region {
    /// The eight control regions of the full extended method.
    pub const SIDEBANDS: [Region; 8] = [
        Region::A,
        Region::B,
        Region::C,
        Region::Bx,
        Region::Cy,
        Region::Ax,
        Region::Ay,
        Region::Axy,
    ];

    /// `(x window, y window)`.
    pub fn windows(self) -> (Window, Window) {
        use Window::*;
        match self {
            Region::D => (Signal, Signal),
            Region::A => (Sideband, Sideband),
            Region::B => (Sideband, Signal),
            Region::C => (Signal, Sideband),
            Region::Ax => (FarSideband, Sideband),
            Region::Bx => (FarSideband, Signal),
            Region::Ay => (Sideband, FarSideband),
            Region::Cy => (Signal, FarSideband),
            Region::Axy => (FarSideband, FarSideband),
        }
    }

    /// Short lowercase name used in output file names.
    pub fn tag(self) -> &'static str {
        match self {
            Region::D => "d",
            Region::A => "a",
            Region::B => "b",
            Region::C => "c",
            Region::Ax => "ax",
            Region::Bx => "bx",
            Region::Ay => "ay",
            Region::Cy => "cy",
            Region::Axy => "axy",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Region::D => "D",
            Region::A => "A",
            Region::B => "B",
            Region::C => "C",
            Region::Ax => "Ax",
            Region::Bx => "Bx",
            Region::Ay => "Ay",
            Region::Cy => "Cy",
            Region::Axy => "Axy",
        };
        f.write_str(s)
    }
}

/// The two axes spanning the ABCD plane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbcdAxes {
    /// x axis name (e.g. `mt`).
    pub x: String,
    /// y axis name (e.g. `iso`).
    pub y: String,
}

/// Find the ABCD axes of a histogram.
pub fn abcd_axes(h: &Histogram) -> Result<AbcdAxes> {
    let find = |candidates: &[&str], which: &str| {
        candidates
            .iter()
            .find(|n| h.has_axis(n))
            .map(|n| n.to_string())
            .ok_or_else(|| {
                Error::Validation(format!(
                    "no ABCD {which} axis among {candidates:?}, histogram has {:?}",
                    h.axis_names()
                ))
            })
    };
    Ok(AbcdAxes { x: find(&X_AXES, "x")?, y: find(&Y_AXES, "y")? })
}

/// Whether large values of this axis are signal-like.
pub fn high_is_signal(name: &str) -> bool {
    matches!(name, "mt")
}

/// Coordinate range `[lo, hi)` of a window on a continuous axis.
///
/// `None` on either side extends into the flow bin.
pub fn window_range(axis: &Axis, window: Window) -> Result<(Option<f64>, Option<f64>)> {
    let AxisKind::Variable { edges, .. } = &axis.kind else {
        return Err(Error::Validation(format!("axis '{}' is not continuous", axis.name)));
    };
    if edges.len() < 3 {
        return Err(Error::Validation(format!(
            "ABCD axis '{}' needs at least 3 edges, got {:?}",
            axis.name, edges
        )));
    }
    let (e0, e1, e2) = (edges[0], edges[1], edges[2]);
    let range = match (high_is_signal(&axis.name), window) {
        (true, Window::Signal) => (Some(e2), None),
        (true, Window::Sideband) => (Some(e1), Some(e2)),
        (true, Window::FarSideband) => (Some(e0), Some(e1)),
        (false, Window::Signal) => (Some(e0), Some(e1)),
        (false, Window::Sideband) => (Some(e1), Some(e2)),
        (false, Window::FarSideband) => (Some(e2), None),
    };
    Ok(range)
}

/// Sum one ABCD axis over a window and remove it.
pub fn select_window(h: &Histogram, name: &str, window: Window) -> Result<Histogram> {
    let axis = h.axis(name)?;
    match axis.kind {
        AxisKind::Boolean => match window {
            Window::Signal => h.select(name, 1),
            Window::Sideband => h.select(name, 0),
            Window::FarSideband => Err(Error::Validation(format!(
                "boolean axis '{name}' has no far sideband"
            ))),
        },
        AxisKind::Variable { .. } => {
            let (lo, hi) = window_range(axis, window)?;
            h.integrate(name, lo, hi)
        }
        AxisKind::Category { .. } => {
            Err(Error::Validation(format!("category axis '{name}' cannot define ABCD regions")))
        }
    }
}

/// Yields of one region with both ABCD axes removed.
pub fn region_hist(h: &Histogram, axes: &AbcdAxes, region: Region) -> Result<Histogram> {
    let (wx, wy) = region.windows();
    let hx = select_window(h, &axes.x, wx)?;
    select_window(&hx, &axes.y, wy)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> Histogram {
        let mut h = Histogram::new(vec![
            Axis::variable("mt", vec![0.0, 20.0, 40.0, 60.0]),
            Axis::variable("iso", vec![0.0, 0.15, 0.3, 0.5]),
        ])
        .unwrap();
        // unique weight per (mt, iso) cell so each region is identifiable
        for (i, mt) in [10.0, 30.0, 50.0, 80.0].iter().enumerate() {
            for (j, iso) in [0.1, 0.2, 0.4, 0.9].iter().enumerate() {
                h.fill(&[*mt, *iso], (10 * i + j) as f64 + 1.0).unwrap();
            }
        }
        h
    }

    #[test]
    fn finds_axes_in_priority_order() {
        let h = grid();
        let ax = abcd_axes(&h).unwrap();
        assert_eq!(ax, AbcdAxes { x: "mt".into(), y: "iso".into() });
        let bad = Histogram::new(vec![Axis::variable("pt", vec![0.0, 1.0])]).unwrap();
        assert!(abcd_axes(&bad).is_err());
    }

    #[test]
    fn region_contents_follow_the_table() {
        let h = grid();
        let ax = abcd_axes(&h).unwrap();
        let y = |r| region_hist(&h, &ax, r).unwrap().scalar_value().0;
        // mt: d2=[0,20) i=0, d=[20,40) i=1, s=[40,inf) i=2,3
        // iso: s=[0,0.15) j=0, d=[0.15,0.3) j=1, d2=[0.3,inf) j=2,3
        assert_eq!(y(Region::D), 21.0 + 31.0);
        assert_eq!(y(Region::A), 12.0);
        assert_eq!(y(Region::B), 11.0);
        assert_eq!(y(Region::C), 22.0 + 32.0);
        assert_eq!(y(Region::Ax), 2.0);
        assert_eq!(y(Region::Bx), 1.0);
        assert_eq!(y(Region::Ay), 13.0 + 14.0);
        assert_eq!(y(Region::Cy), 23.0 + 24.0 + 33.0 + 34.0);
        assert_eq!(y(Region::Axy), 3.0 + 4.0);
    }

    #[test]
    fn boolean_axes_select_bins() {
        let mut h = Histogram::new(vec![Axis::boolean("passMT"), Axis::boolean("passIso")]).unwrap();
        h.fill(&[1.0, 1.0], 5.0).unwrap();
        h.fill(&[0.0, 1.0], 2.0).unwrap();
        let ax = abcd_axes(&h).unwrap();
        assert_eq!(region_hist(&h, &ax, Region::D).unwrap().scalar_value().0, 5.0);
        assert_eq!(region_hist(&h, &ax, Region::B).unwrap().scalar_value().0, 2.0);
        assert!(region_hist(&h, &ax, Region::Axy).is_err());
    }
}
