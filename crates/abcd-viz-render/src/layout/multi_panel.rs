use crate::layout::margins::PlotArea;

/// Main panel on top of a ratio panel sharing the x axis.
#[derive(Debug, Clone)]
pub struct MainRatioLayout {
    pub main: PlotArea,
    pub ratio: PlotArea,
}

impl MainRatioLayout {
    pub fn new(left: f64, top: f64, width: f64, total_height: f64, gap: f64, ratio_frac: f64) -> Self {
        let ratio_h = total_height * ratio_frac.clamp(0.1, 0.6);
        let main_h = total_height - ratio_h - gap;
        Self {
            main: PlotArea::manual(left, top, width, main_h),
            ratio: PlotArea::manual(left, top + main_h + gap, width, ratio_h),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panels_stack_without_overlap() {
        let l = MainRatioLayout::new(50.0, 30.0, 400.0, 500.0, 5.0, 0.3);
        assert!((l.ratio.height - 150.0).abs() < 1e-9);
        assert!((l.ratio.top - l.main.bottom() - 5.0).abs() < 1e-9);
        assert!((l.ratio.bottom() - 530.0).abs() < 1e-9);
    }
}
