/// Influenza-like-illness surveillance overlay.
///
/// A thin weighted view: per node, the reported ILI signal is the
/// provider weight times the infectious fraction. The engine appends one
/// row per simulated day.
pub fn ili_view(infectious: &[f64], population: &[f64], provider_weights: &[f64]) -> Vec<f64> {
    infectious
        .iter()
        .zip(population)
        .zip(provider_weights)
        .map(|((&inf, &pop), &weight)| {
            if pop > 0.0 {
                weight * inf / pop
            } else {
                0.0
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::ili_view;

    #[test]
    fn weighted_fraction_per_node() {
        let ili = ili_view(&[50.0, 0.0], &[1000.0, 500.0], &[1.0, 0.6]);
        assert_eq!(ili, vec![0.05, 0.0]);
    }

    #[test]
    fn empty_node_reports_zero() {
        let ili = ili_view(&[5.0], &[0.0], &[1.0]);
        assert_eq!(ili, vec![0.0]);
    }
}
