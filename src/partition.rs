/// Splits a request budget into per-worker quotas.
///
/// Returns `min(concurrency, requests)` quotas that sum to `requests`. The
/// first `requests % concurrency` workers get one extra request, so quotas
/// never differ by more than one. A zero budget or zero concurrency yields
/// no workers at all.
pub fn partition(requests: usize, concurrency: usize) -> Vec<usize> {
    let workers = concurrency.min(requests);
    if workers == 0 {
        return Vec::new();
    }

    let base = requests / workers;
    let remainder = requests % workers;

    (0..workers)
        .map(|i| if i < remainder { base + 1 } else { base })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remainder_goes_to_first_workers() {
        assert_eq!(partition(10, 3), vec![4, 3, 3]);
    }

    #[test]
    fn more_workers_than_requests_is_clamped() {
        assert_eq!(partition(5, 10), vec![1, 1, 1, 1, 1]);
    }

    #[test]
    fn even_split() {
        assert_eq!(partition(12, 4), vec![3, 3, 3, 3]);
    }

    #[test]
    fn single_worker_takes_everything() {
        assert_eq!(partition(7, 1), vec![7]);
    }

    #[test]
    fn zero_requests_means_no_workers() {
        assert!(partition(0, 8).is_empty());
    }

    #[test]
    fn zero_concurrency_means_no_workers() {
        assert!(partition(8, 0).is_empty());
    }

    #[test]
    fn quotas_always_sum_and_stay_balanced() {
        for requests in 0..60 {
            for concurrency in 1..20 {
                let quotas = partition(requests, concurrency);

                assert_eq!(quotas.len(), concurrency.min(requests));
                assert_eq!(quotas.iter().sum::<usize>(), requests);

                if let (Some(max), Some(min)) = (quotas.iter().max(), quotas.iter().min()) {
                    assert!(
                        max - min <= 1,
                        "requests={} concurrency={} quotas={:?}",
                        requests,
                        concurrency,
                        quotas
                    );
                    assert!(*min >= 1);
                }
            }
        }
    }
}
