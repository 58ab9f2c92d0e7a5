use crate::params::Axis;
use itertools::Itertools;

/// Evenly spaced values across one axis.
///
/// Integer axes are rounded and deduplicated, so a narrow integer range may
/// produce fewer than `points` values. Fixed axes always produce one value.
pub fn axis_values(axis: &Axis, points: usize) -> Vec<f64> {
    if axis.is_fixed() || points <= 1 {
        return vec![axis.snap(axis.low)];
    }
    let step = (axis.high - axis.low) / (points - 1) as f64;
    let mut values: Vec<f64> = (0..points)
        .map(|i| axis.snap(axis.low + step * i as f64))
        .collect();
    values.dedup();
    values
}

/// Generates every combination of per-axis grid values, in axis order.
pub fn generate_grid(axes: &[Axis], points: usize) -> Vec<Vec<f64>> {
    axes.iter()
        .map(|axis| axis_values(axis, points))
        .multi_cartesian_product()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::axes;
    use configuration::ParameterSpace;

    #[test]
    fn grid_covers_every_combination() {
        let axes = axes(&ParameterSpace::default());
        let grid = generate_grid(&axes, 2);
        assert_eq!(grid.len(), 1 << 7);
        assert!(grid.iter().all(|p| p.len() == 7));
        assert_eq!(grid[0][0], 6.0);
        assert_eq!(grid[grid.len() - 1][0], 12.0);
    }

    #[test]
    fn narrow_integer_axis_is_deduplicated() {
        let axis = Axis {
            name: "depth",
            low: 6.0,
            high: 7.0,
            integer: true,
        };
        assert_eq!(axis_values(&axis, 5), vec![6.0, 7.0]);
    }
}
