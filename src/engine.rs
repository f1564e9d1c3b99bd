//! Cascade merge engine.

use std::error::Error;
use std::fmt;
use std::fmt::Display;

use crate::distribution::{ideal_distribution, pad_with_dummies, DistributionError};
use crate::heap::{HeapError, SelectionHeap};
use crate::metrics::MetricsCollector;
use crate::tape::{Run, TapeError, TapeSet};

/// Observer invoked after every merge phase with the phase index and a view
/// of the tapes. Purely a notification: it cannot influence the engine.
pub type PhaseObserver<T> = Box<dyn FnMut(usize, &TapeSet<T>)>;

/// Sorting error.
#[derive(Debug)]
pub enum SortError {
    /// Selection heap capacity violation.
    Heap(HeapError),
    /// Tape access or scheduling invariant violation.
    Tape(TapeError),
    /// Run distribution planning violation.
    Distribution(DistributionError),
    /// Fewer than 3 tapes were configured.
    InvalidTapeCount(usize),
    /// A memory bound of zero records was configured.
    InvalidMemorySize,
    /// The caller asserted a run count the input does not produce.
    RunCountMismatch { expected: usize, actual: usize },
}

impl Error for SortError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self {
            SortError::Heap(err) => Some(err),
            SortError::Tape(err) => Some(err),
            SortError::Distribution(err) => Some(err),
            SortError::InvalidTapeCount(_) => None,
            SortError::InvalidMemorySize => None,
            SortError::RunCountMismatch { .. } => None,
        }
    }
}

impl Display for SortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self {
            SortError::Heap(err) => write!(f, "run generation failed: {}", err),
            SortError::Tape(err) => write!(f, "tape scheduling failed: {}", err),
            SortError::Distribution(err) => write!(f, "run distribution failed: {}", err),
            SortError::InvalidTapeCount(count) => {
                write!(f, "cascade merge needs at least 3 tapes, got {}", count)
            }
            SortError::InvalidMemorySize => write!(f, "memory size must be at least 1 record"),
            SortError::RunCountMismatch { expected, actual } => {
                write!(f, "expected {} initial runs, generated {}", expected, actual)
            }
        }
    }
}

/// Cascade merge engine builder. Provides methods for [`CascadeMergeEngine`]
/// initialization.
pub struct CascadeMergeEngineBuilder<T> {
    /// Number of records the selection heap may hold at a time.
    memory_size: usize,
    /// Number of tapes, including the output tape.
    num_tapes: usize,
    /// Run count the caller expects replacement selection to produce.
    expected_runs: Option<usize>,
    /// Per-phase notification hook.
    observer: Option<PhaseObserver<T>>,
}

impl<T: Ord> CascadeMergeEngineBuilder<T> {
    /// Creates a builder for an engine with the given memory bound and tape
    /// count.
    pub fn new(memory_size: usize, num_tapes: usize) -> Self {
        CascadeMergeEngineBuilder {
            memory_size,
            num_tapes,
            expected_runs: None,
            observer: None,
        }
    }

    /// Sets the run count the input is expected to produce; a mismatch makes
    /// [`build`](Self::build) fail with a configuration error.
    pub fn with_expected_runs(mut self, expected_runs: usize) -> Self {
        self.expected_runs = Some(expected_runs);
        return self;
    }

    /// Sets an observer to be notified after every merge phase.
    pub fn with_observer(mut self, observer: impl FnMut(usize, &TapeSet<T>) + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        return self;
    }

    /// Generates the initial runs, lays them out on the tapes and returns the
    /// ready-to-run engine.
    pub fn build<I>(self, records: I) -> Result<CascadeMergeEngine<T>, SortError>
    where
        I: IntoIterator<Item = T>,
    {
        if self.num_tapes < 3 {
            return Err(SortError::InvalidTapeCount(self.num_tapes));
        }
        if self.memory_size == 0 {
            return Err(SortError::InvalidMemorySize);
        }

        let heap = SelectionHeap::new(records.into_iter(), self.memory_size).map_err(SortError::Heap)?;
        let runs: Vec<Run<T>> = heap.collect::<Result<_, _>>().map_err(SortError::Heap)?;

        if let Some(expected) = self.expected_runs {
            if runs.len() != expected {
                return Err(SortError::RunCountMismatch {
                    expected,
                    actual: runs.len(),
                });
            }
        }

        let total_records: usize = runs.iter().map(Run::len).sum();
        let num_runs = runs.len();
        log::debug!("generated {} initial runs ({} records)", num_runs, total_records);

        let mut metrics = MetricsCollector::new(self.memory_size, total_records);
        let mut tapes = TapeSet::new(self.num_tapes);

        if num_runs > 0 {
            Self::distribute_runs(&mut tapes, runs)?;
            metrics.record_distribution(total_records, num_runs);
        }

        return Ok(CascadeMergeEngine {
            tapes,
            num_tapes: self.num_tapes,
            total_records,
            metrics,
            observer: self.observer,
            phase: 0,
        });
    }

    /// Lays the initial runs out on the input tapes: the ideal distribution's
    /// zero entry marks the output tape (kept last), the remaining capacities
    /// go to tapes `0..T-1` in order, and runs are dealt round-robin across
    /// them, skipping tapes that reached their capacity. Every shortfall is
    /// topped up with dummy runs.
    fn distribute_runs(tapes: &mut TapeSet<T>, runs: Vec<Run<T>>) -> Result<(), SortError> {
        let mut capacities = ideal_distribution(runs.len(), tapes.num_tapes());
        if let Some(zero_idx) = capacities.iter().position(|&capacity| capacity == 0) {
            capacities.remove(zero_idx);
        }
        log::debug!("ideal run distribution: {:?}", capacities);

        let input_tapes = capacities.len();
        let mut buckets: Vec<Vec<Run<T>>> = (0..input_tapes).map(|_| Vec::new()).collect();
        let mut cursor = 0;
        for run in runs {
            while buckets[cursor % input_tapes].len() >= capacities[cursor % input_tapes] {
                cursor += 1;
            }
            buckets[cursor % input_tapes].push(run);
            cursor += 1;
        }

        for (index, bucket) in buckets.into_iter().enumerate() {
            let padded = pad_with_dummies(bucket, capacities[index]).map_err(SortError::Distribution)?;
            for run in padded {
                tapes.append_run(index, run);
            }
        }

        return Ok(());
    }
}

/// Cascade merge engine.
///
/// Simulates sorting a record stream on `T` sequential tapes: replacement
/// selection turns the stream into ascending runs, the runs are laid out on
/// `T-1` tapes following the ideal cascade distribution, and repeated
/// `(T-1)`-way merges with a rotating output tape reduce them to a single
/// sorted run.
pub struct CascadeMergeEngine<T> {
    tapes: TapeSet<T>,
    num_tapes: usize,
    total_records: usize,
    metrics: MetricsCollector,
    observer: Option<PhaseObserver<T>>,
    phase: usize,
}

impl<T: Ord> CascadeMergeEngine<T> {
    /// Creates an engine with default settings. See
    /// [`CascadeMergeEngineBuilder`] for the observer and run-count options.
    pub fn new<I>(records: I, memory_size: usize, num_tapes: usize) -> Result<Self, SortError>
    where
        I: IntoIterator<Item = T>,
    {
        CascadeMergeEngineBuilder::new(memory_size, num_tapes).build(records)
    }

    /// Runs the merge loop to completion and returns the sorted records.
    ///
    /// Each phase merges the `T-1` non-output tapes into the output tape over
    /// `T-2` sub-phases; a sub-phase ends when one input tape runs dry, and
    /// that tape becomes the next output. The engine terminates once the
    /// output tape's head run covers every input record; dummy padding never
    /// leaks into the result.
    pub fn run_to_completion(&mut self) -> Result<Vec<T>, SortError> {
        if self.total_records == 0 {
            log::debug!("empty input, nothing to merge");
            return Ok(Vec::new());
        }

        self.notify_phase();

        let mut out_idx = self.tapes.index_of_empty_tape().map_err(SortError::Tape)?;
        loop {
            let mut inputs: Vec<usize> = (0..self.num_tapes).filter(|&index| index != out_idx).collect();

            for _ in 0..self.num_tapes - 2 {
                let mut write_ops = 0;
                let mut runs_emitted = 0;

                while inputs.iter().all(|&index| self.tapes.run_count(index) > 0) {
                    let merged = self.merge_step(&inputs)?;
                    write_ops += merged.len();
                    runs_emitted += 1;
                    self.tapes.append_run(out_idx, merged);
                }
                self.metrics.record_merge_phase(write_ops, runs_emitted);
                log::debug!(
                    "merged tapes {:?} -> {} ({} records, {} runs)",
                    inputs,
                    out_idx,
                    write_ops,
                    runs_emitted
                );

                if self.tapes.front_run_len(out_idx) >= self.total_records {
                    let mut sorted = self.tapes.pop_front_run(out_idx).map_err(SortError::Tape)?.into_records();
                    // Defends the exact output length; with dummy runs dropped
                    // at merge time this is a no-op.
                    sorted.truncate(self.total_records);
                    self.notify_phase();
                    return Ok(sorted);
                }

                out_idx = self.tapes.index_of_empty_tape().map_err(SortError::Tape)?;
                inputs.retain(|&index| index != out_idx);
            }

            log::debug!("phase {} complete (smallest run: {})", self.phase, self.tapes.smallest_run_length());
            self.notify_phase();
        }
    }

    /// One merge step: pops the head run of every input tape and merges them
    /// into a single run. Exhausted runs leave the active set; the tape's next
    /// run never joins the same step. Merging nothing but dummies yields a
    /// dummy, so padding flows through without fabricating records.
    fn merge_step(&mut self, inputs: &[usize]) -> Result<Run<T>, SortError> {
        let mut cursors = Vec::with_capacity(inputs.len());
        for &index in inputs {
            let run = self.tapes.pop_front_run(index).map_err(SortError::Tape)?;
            cursors.push(RunCursor::new(run));
        }

        let mut merged = Vec::new();
        loop {
            let mut min: Option<(usize, &T)> = None;
            for (index, cursor) in cursors.iter().enumerate() {
                if let Some(head) = cursor.head() {
                    match min {
                        // Ties keep the earlier cursor, i.e. the lowest tape index.
                        Some((_, smallest)) if smallest <= head => {}
                        _ => min = Some((index, head)),
                    }
                }
            }

            let index = match min {
                Some((index, _)) => index,
                None => break,
            };

            if let Some(value) = cursors[index].advance() {
                merged.push(value);
            }
            if cursors[index].head().is_none() {
                cursors.remove(index);
            }
        }

        if merged.is_empty() {
            return Ok(Run::Dummy);
        }
        return Ok(Run::Real(merged));
    }

    fn notify_phase(&mut self) {
        if let Some(observer) = self.observer.as_mut() {
            observer(self.phase, &self.tapes);
        }
        self.phase += 1;
    }

    /// Write amplification of the finished simulation.
    pub fn alpha(&self) -> f64 {
        self.metrics.alpha()
    }

    /// Load factor at a recorded phase.
    pub fn beta(&self, phase: usize) -> f64 {
        self.metrics.beta(phase)
    }

    /// Read access to the accumulated per-phase statistics.
    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }
}

/// Sequential read position inside a run being merged.
struct RunCursor<T> {
    head: Option<T>,
    rest: std::vec::IntoIter<T>,
}

impl<T> RunCursor<T> {
    fn new(run: Run<T>) -> Self {
        let mut rest = run.into_records().into_iter();
        RunCursor { head: rest.next(), rest }
    }

    fn head(&self) -> Option<&T> {
        self.head.as_ref()
    }

    fn advance(&mut self) -> Option<T> {
        let value = self.head.take();
        self.head = self.rest.next();
        value
    }
}

#[cfg(test)]
mod test {
    use std::cell::RefCell;
    use std::rc::Rc;

    use rand::seq::SliceRandom;
    use rstest::*;

    use super::{CascadeMergeEngine, CascadeMergeEngineBuilder, SortError};

    #[test]
    fn test_end_to_end() {
        let records = vec![7, 1, 5, 6, 3, 8, 2, 10, 4, 9];

        let mut engine = CascadeMergeEngine::new(records, 3, 5).unwrap();
        let sorted = engine.run_to_completion().unwrap();

        assert_eq!(sorted, Vec::from_iter(1..=10));
        assert!((engine.alpha() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_input() {
        let mut engine: CascadeMergeEngine<i64> = CascadeMergeEngine::new(vec![], 3, 5).unwrap();
        let sorted = engine.run_to_completion().unwrap();

        assert_eq!(sorted, Vec::<i64>::new());
        assert_eq!(engine.alpha(), 0.0);
    }

    #[rstest]
    #[case(3)]
    #[case(4)]
    #[case(5)]
    #[case(6)]
    fn test_sorting_oracle(#[case] num_tapes: usize) {
        for size in [0, 1, 2, 17, 123] {
            let mut records = Vec::from_iter(0..size);
            records.shuffle(&mut rand::thread_rng());

            let mut engine = CascadeMergeEngine::new(records, 4, num_tapes).unwrap();
            let sorted = engine.run_to_completion().unwrap();

            assert_eq!(sorted, Vec::from_iter(0..size), "tapes={}, size={}", num_tapes, size);
        }
    }

    #[test]
    fn test_no_dummy_residue_with_duplicates() {
        let records = vec![5, 5, 1, 3, 3, 3, 2, 9, 0, 9, 5, 1];
        let mut expected = records.clone();
        expected.sort();

        let mut engine = CascadeMergeEngine::new(records, 2, 4).unwrap();
        let sorted = engine.run_to_completion().unwrap();

        assert_eq!(sorted.len(), expected.len());
        assert_eq!(sorted, expected);
    }

    #[test]
    fn test_alpha_when_input_exceeds_memory() {
        let mut records = Vec::from_iter(0..50);
        records.shuffle(&mut rand::thread_rng());

        let mut engine = CascadeMergeEngine::new(records, 3, 4).unwrap();
        engine.run_to_completion().unwrap();

        assert!(engine.alpha() >= 1.0);
    }

    #[test]
    fn test_beta_reports_run_lengths() {
        let records = vec![7, 1, 5, 6, 3, 8, 2, 10, 4, 9];

        let mut engine = CascadeMergeEngine::new(records, 3, 5).unwrap();
        engine.run_to_completion().unwrap();

        // Phase 0 is the initial distribution: 10 records in 2 runs against
        // a memory bound of 3.
        assert!((engine.beta(0) - 10.0 / 6.0).abs() < 1e-9);
        assert!(engine.beta(1) > 0.0);
    }

    #[test]
    fn test_invalid_configuration() {
        assert!(matches!(
            CascadeMergeEngine::<i64>::new(vec![1], 3, 2),
            Err(SortError::InvalidTapeCount(2))
        ));
        assert!(matches!(
            CascadeMergeEngine::<i64>::new(vec![1], 0, 5),
            Err(SortError::InvalidMemorySize)
        ));
    }

    #[test]
    fn test_expected_run_count_mismatch() {
        let records = vec![7, 1, 5, 6, 3, 8, 2, 10, 4, 9];

        let result = CascadeMergeEngineBuilder::new(3, 5)
            .with_expected_runs(7)
            .build(records);

        assert!(matches!(
            result,
            Err(SortError::RunCountMismatch { expected: 7, actual: 2 })
        ));
    }

    #[test]
    fn test_observer_sees_initial_distribution() {
        let records = vec![7, 1, 5, 6, 3, 8, 2, 10, 4, 9];
        let snapshots: Rc<RefCell<Vec<Vec<usize>>>> = Rc::new(RefCell::new(Vec::new()));

        let sink = Rc::clone(&snapshots);
        let mut engine = CascadeMergeEngineBuilder::new(3, 5)
            .with_observer(move |_, tapes| {
                let counts = (0..tapes.num_tapes()).map(|index| tapes.run_count(index)).collect();
                sink.borrow_mut().push(counts);
            })
            .build(records)
            .unwrap();
        engine.run_to_completion().unwrap();

        let snapshots = snapshots.borrow();
        // Two initial runs padded to the ideal distribution for 5 tapes.
        assert_eq!(snapshots[0], vec![1, 1, 1, 1, 0]);
        // Terminal snapshot: everything merged onto the former output tape.
        let last = snapshots.last().unwrap();
        assert_eq!(last.iter().sum::<usize>(), 0);
    }
}
