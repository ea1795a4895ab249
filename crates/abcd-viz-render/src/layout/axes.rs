/// One plot axis: limits, scale, ticks and the data-to-pixel map.
#[derive(Debug, Clone)]
pub struct Axis {
    pub min: f64,
    pub max: f64,
    pub log: bool,
    pub label: String,
    pub tick_positions: Vec<f64>,
    pub tick_labels: Vec<String>,
    pub minor_ticks: Vec<f64>,
}

/// Multiples of `step` within `[lo, hi]`, tolerant to rounding at both ends.
fn multiples(lo: f64, hi: f64, step: f64) -> impl Iterator<Item = f64> {
    let first = (lo / step - 1e-9).ceil();
    let last = (hi / step + 1e-6).floor();
    let n = if last >= first { (last - first) as usize + 1 } else { 0 };
    (0..n).map(move |k| (first + k as f64) * step)
}

impl Axis {
    fn bare(min: f64, max: f64, log: bool) -> Self {
        Self {
            min,
            max,
            log,
            label: String::new(),
            tick_positions: Vec::new(),
            tick_labels: Vec::new(),
            minor_ticks: Vec::new(),
        }
    }

    /// Linear axis with exactly these limits and about `target_ticks` round ticks.
    pub fn linear(min: f64, max: f64, target_ticks: usize) -> Self {
        let (min, max) = ordered(min, max);
        let step = nice_step((max - min) / (target_ticks.max(2) - 1) as f64);
        let mut ax = Self::bare(min, max, false);
        ax.tick_positions = multiples(min, max, step).collect();
        ax.tick_labels = ax.tick_positions.iter().map(|&v| format_tick(v, step)).collect();
        let minor = step / 5.0;
        ax.minor_ticks = multiples(min, max, minor)
            .filter(|m| ax.tick_positions.iter().all(|t| (t - m).abs() >= minor * 0.01))
            .collect();
        ax
    }

    /// Base-10 log axis; majors at decades, minors at 2..9 times each decade.
    pub fn log(min: f64, max: f64) -> Self {
        let min = min.max(1e-20);
        let max = max.max(min * 10.0);
        let mut ax = Self::bare(min, max, true);
        for exp in (min.log10().floor() as i32)..=(max.log10().ceil() as i32) {
            let decade = 10f64.powi(exp);
            if decade >= min * (1.0 - 1e-9) && decade <= max * (1.0 + 1e-9) {
                ax.tick_positions.push(decade);
                ax.tick_labels.push(format!("10{}", superscript(exp)));
            }
            ax.minor_ticks.extend((2..=9).map(|m| m as f64 * decade).filter(|v| (min..=max).contains(v)));
        }
        ax
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Keeps the ticks, drops their labels (shared x axis above a ratio panel).
    pub fn without_tick_labels(mut self) -> Self {
        self.tick_labels.clear();
        self
    }

    fn fraction(&self, value: f64) -> f64 {
        if self.log {
            let ln = |v: f64| v.max(1e-20).ln();
            (ln(value) - ln(self.min)) / (ln(self.max) - ln(self.min))
        } else {
            (value - self.min) / (self.max - self.min)
        }
    }

    pub fn data_to_pixel(&self, value: f64, px_min: f64, px_max: f64) -> f64 {
        // off-scale points stay finite; the plot clip hides them
        px_min + self.fraction(value).clamp(-10.0, 11.0) * (px_max - px_min)
    }
}

fn ordered(a: f64, b: f64) -> (f64, f64) {
    if (b - a).abs() < 1e-15 {
        (a - 1.0, b + 1.0)
    } else {
        (a.min(b), a.max(b))
    }
}

/// Round `rough` to 1, 2, 5 or 10 times a power of ten.
fn nice_step(rough: f64) -> f64 {
    let scale = 10f64.powf(rough.abs().log10().floor());
    let mantissa = rough / scale;
    let nice = [(1.5, 1.0), (3.5, 2.0), (7.5, 5.0)]
        .iter()
        .find(|(limit, _)| mantissa <= *limit)
        .map_or(10.0, |(_, n)| *n);
    nice * scale
}

fn format_tick(value: f64, step: f64) -> String {
    let v = if value.abs() < step * 0.01 { 0.0 } else { value };
    if step >= 1.0 {
        format!("{}", v.round() as i64)
    } else {
        let decimals = (-step.log10().floor()) as usize;
        format!("{v:.decimals$}")
    }
}

const SUPERSCRIPT_DIGITS: [char; 10] =
    ['\u{2070}', '\u{00B9}', '\u{00B2}', '\u{00B3}', '\u{2074}', '\u{2075}', '\u{2076}', '\u{2077}', '\u{2078}', '\u{2079}'];

fn superscript(n: i32) -> String {
    let digits = n.unsigned_abs().to_string();
    let sign = (n < 0).then_some('\u{207B}');
    sign.into_iter()
        .chain(digits.bytes().map(|b| SUPERSCRIPT_DIGITS[(b - b'0') as usize]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_limits_keep_ticks_inside() {
        let ax = Axis::linear(0.9, 1.1, 5);
        assert_eq!((ax.min, ax.max), (0.9, 1.1));
        assert!(ax.tick_positions.iter().all(|t| *t >= 0.9 - 1e-12 && *t <= 1.1 + 1e-12));
        assert!(ax.tick_labels.iter().any(|l| l == "1.00" || l == "1.0"));
    }

    #[test]
    fn swapped_and_degenerate_limits() {
        let ax = Axis::linear(10.0, 0.0, 6);
        assert_eq!((ax.min, ax.max), (0.0, 10.0));
        let flat = Axis::linear(3.0, 3.0, 6);
        assert_eq!((flat.min, flat.max), (2.0, 4.0));
    }

    #[test]
    fn minor_ticks_skip_majors() {
        let ax = Axis::linear(0.0, 10.0, 6);
        assert_eq!(ax.tick_positions, vec![0.0, 2.0, 4.0, 6.0, 8.0, 10.0]);
        assert!(!ax.minor_ticks.iter().any(|m| (m - 2.0).abs() < 1e-9));
        assert_eq!(ax.minor_ticks.len(), 20);
    }

    #[test]
    fn data_to_pixel_linear() {
        let ax = Axis::linear(0.0, 100.0, 5);
        assert!((ax.data_to_pixel(50.0, 0.0, 500.0) - 250.0).abs() < 1e-9);
    }

    #[test]
    fn log_axis_decades() {
        let ax = Axis::log(0.01, 1000.0);
        assert!(ax.log);
        assert_eq!(ax.tick_positions.len(), 6);
        assert_eq!(ax.tick_labels.first().map(String::as_str), Some("10\u{207B}\u{00B2}"));
        assert_eq!(ax.tick_labels.last().map(String::as_str), Some("10\u{00B3}"));
        assert!((ax.data_to_pixel(1.0, 0.0, 500.0) - 200.0).abs() < 1e-9);
    }

    #[test]
    fn nice_step_values() {
        assert!((nice_step(3.2) - 2.0).abs() < 1e-9);
        assert!((nice_step(0.7) - 0.5).abs() < 1e-9);
        assert!((nice_step(15.0) - 10.0).abs() < 1e-9);
        assert!((nice_step(4.5) - 5.0).abs() < 1e-9);
    }
}
