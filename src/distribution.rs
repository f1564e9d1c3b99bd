//! Ideal run distribution planning.

use std::error::Error;
use std::fmt;

use crate::tape::Run;

/// Distribution planning error.
#[derive(Debug, PartialEq, Eq)]
pub enum DistributionError {
    /// More real runs were offered to a tape than its planned capacity.
    CapacityExceeded { runs: usize, capacity: usize },
}

impl Error for DistributionError {}

impl fmt::Display for DistributionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistributionError::CapacityExceeded { runs, capacity } => {
                write!(f, "{} runs do not fit a planned capacity of {}", runs, capacity)
            }
        }
    }
}

/// Computes the perfect initial run distribution for a cascade merge over
/// `num_tapes` tapes (`num_tapes` must be at least 3).
///
/// The returned vector has one entry per tape: the number of runs the tape
/// should hold before the first merge phase so that every sub-phase consumes
/// all of its input tapes simultaneously and empties them in a staggered
/// order. Exactly one entry is zero (the initial output tape) and the sum is
/// the smallest count reachable by the order-(`num_tapes`-1) Fibonacci
/// recurrence that is at least `num_runs`. A shortfall of real runs against
/// this vector is covered with dummy runs, never by truncating the plan.
pub fn ideal_distribution(num_runs: usize, num_tapes: usize) -> Vec<usize> {
    debug_assert!(num_tapes >= 3, "cascade merge needs at least 3 tapes");

    let mut line = vec![0; num_tapes];
    line[num_tapes - 1] = 1;

    // Applied at least once so the single-zero shape holds even for one run.
    loop {
        line = previous_line(&line);
        if line.iter().sum::<usize>() >= num_runs {
            return line;
        }
    }
}

/// One step of the distribution recurrence: the line that, merged for one
/// phase, would produce `line`. The position of the maximum goes empty; every
/// other position, visited left to right, receives the sum of the line after
/// one more removal of its smallest entry.
fn previous_line(line: &[usize]) -> Vec<usize> {
    let mut max_idx = 0;
    for (i, &count) in line.iter().enumerate() {
        if count > line[max_idx] {
            max_idx = i;
        }
    }

    let mut working = line.to_vec();
    let mut previous = vec![0; line.len()];
    for i in (0..line.len()).filter(|&i| i != max_idx) {
        let mut min_idx = 0;
        for (j, &count) in working.iter().enumerate() {
            if count < working[min_idx] {
                min_idx = j;
            }
        }
        working.remove(min_idx);
        previous[i] = working.iter().sum();
    }

    previous
}

/// Pads a tape's runs with dummies up to its planned capacity.
pub fn pad_with_dummies<T>(mut runs: Vec<Run<T>>, ideal_count: usize) -> Result<Vec<Run<T>>, DistributionError> {
    if runs.len() > ideal_count {
        return Err(DistributionError::CapacityExceeded {
            runs: runs.len(),
            capacity: ideal_count,
        });
    }

    runs.resize_with(ideal_count, || Run::Dummy);
    Ok(runs)
}

#[cfg(test)]
mod test {
    use rstest::*;

    use super::{ideal_distribution, pad_with_dummies, DistributionError};
    use crate::tape::Run;

    #[rstest]
    #[case(1, 5, vec![1, 1, 1, 1, 0])]
    #[case(4, 5, vec![1, 1, 1, 1, 0])]
    #[case(5, 5, vec![0, 4, 3, 2, 1])]
    #[case(10, 5, vec![0, 4, 3, 2, 1])]
    #[case(11, 5, vec![10, 0, 9, 7, 4])]
    #[case(2, 3, vec![1, 1, 0])]
    #[case(3, 3, vec![0, 2, 1])]
    #[case(5, 3, vec![3, 0, 2])]
    #[case(8, 3, vec![0, 5, 3])]
    fn test_ideal_distribution(#[case] num_runs: usize, #[case] num_tapes: usize, #[case] expected: Vec<usize>) {
        assert_eq!(ideal_distribution(num_runs, num_tapes), expected);
    }

    #[test]
    fn test_distribution_shape() {
        for num_tapes in 3..=6 {
            for num_runs in 1..=60 {
                let distribution = ideal_distribution(num_runs, num_tapes);

                assert_eq!(distribution.len(), num_tapes);
                assert_eq!(distribution.iter().filter(|&&count| count == 0).count(), 1);
                assert!(distribution.iter().sum::<usize>() >= num_runs);
            }
        }
    }

    #[test]
    fn test_pad_with_dummies() {
        let runs = vec![Run::Real(vec![1, 2]), Run::Real(vec![3])];

        let padded = pad_with_dummies(runs, 4).unwrap();
        assert_eq!(padded.len(), 4);
        assert!(!padded[0].is_dummy());
        assert!(!padded[1].is_dummy());
        assert!(padded[2].is_dummy());
        assert!(padded[3].is_dummy());
    }

    #[test]
    fn test_pad_with_dummies_rejects_overflow() {
        let runs: Vec<Run<i32>> = vec![Run::Real(vec![1]), Run::Real(vec![2])];

        assert_eq!(
            pad_with_dummies(runs, 1),
            Err(DistributionError::CapacityExceeded { runs: 2, capacity: 1 })
        );
    }
}
