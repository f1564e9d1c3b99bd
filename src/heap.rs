//! Replacement-selection run generation.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::error::Error;
use std::fmt;

use crate::tape::Run;

/// Selection heap error.
#[derive(Debug, PartialEq, Eq)]
pub enum HeapError {
    /// An insertion would exceed the configured memory bound.
    Overflow,
    /// An extraction was attempted on an empty heap.
    Underflow,
}

impl Error for HeapError {}

impl fmt::Display for HeapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeapError::Overflow => write!(f, "selection heap overflow"),
            HeapError::Underflow => write!(f, "selection heap underflow"),
        }
    }
}

/// A buffered record tagged with the run it belongs to.
///
/// A record pulled from the stream while a run is being emitted joins that run
/// only if it is not smaller than the last record written out; otherwise it is
/// held back for the next run. The tag is part of the heap order: every
/// `Current` node sorts before every `Future` node, so held-back records never
/// surface while the current run is open, and the run boundary is simply the
/// moment the heap minimum is a `Future` node.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum HeapNode<T> {
    Current(T),
    Future(T),
}

impl<T> HeapNode<T> {
    fn is_future(&self) -> bool {
        matches!(self, HeapNode::Future(_))
    }

    fn into_value(self) -> T {
        match self {
            HeapNode::Current(value) | HeapNode::Future(value) => value,
        }
    }
}

/// Replacement-selection heap.
/// Consumes a record stream strictly once, forward, holding at most
/// `memory_size` records at a time, and yields the stream reordered as a
/// sequence of ascending runs. Runs come out longer than the memory bound
/// whenever the input carries some pre-existing order.
pub struct SelectionHeap<T, I>
where
    T: Ord,
    I: Iterator<Item = T>,
{
    input: I,
    heap: BinaryHeap<Reverse<HeapNode<T>>>,
    memory_size: usize,
}

impl<T, I> SelectionHeap<T, I>
where
    T: Ord,
    I: Iterator<Item = T>,
{
    /// Creates a selection heap over an input stream and fills it with up to
    /// `memory_size` records. `memory_size` must be at least 1.
    pub fn new(input: impl IntoIterator<Item = T, IntoIter = I>, memory_size: usize) -> Result<Self, HeapError> {
        let mut selection = SelectionHeap {
            input: input.into_iter(),
            heap: BinaryHeap::with_capacity(memory_size),
            memory_size,
        };

        for _ in 0..selection.memory_size {
            match selection.input.next() {
                Some(record) => selection.insert(HeapNode::Current(record))?,
                None => break,
            }
        }

        return Ok(selection);
    }

    fn insert(&mut self, node: HeapNode<T>) -> Result<(), HeapError> {
        if self.heap.len() >= self.memory_size {
            return Err(HeapError::Overflow);
        }

        self.heap.push(Reverse(node));
        return Ok(());
    }

    fn extract_min(&mut self) -> Result<HeapNode<T>, HeapError> {
        self.heap.pop().map(|Reverse(node)| node).ok_or(HeapError::Underflow)
    }

    /// Retags every buffered record as belonging to the run about to open.
    /// Called at a run boundary, when all remaining nodes are `Future`.
    fn open_next_run(&mut self) {
        let held_back = std::mem::take(&mut self.heap);
        self.heap = held_back
            .into_iter()
            .map(|Reverse(node)| Reverse(HeapNode::Current(node.into_value())))
            .collect();
    }
}

impl<T, I> Iterator for SelectionHeap<T, I>
where
    T: Ord,
    I: Iterator<Item = T>,
{
    type Item = Result<Run<T>, HeapError>;

    /// Produces the next complete run.
    fn next(&mut self) -> Option<Self::Item> {
        match self.heap.peek() {
            None => return None,
            Some(Reverse(node)) if node.is_future() => self.open_next_run(),
            Some(_) => {}
        }

        let mut records = Vec::new();
        loop {
            match self.heap.peek() {
                None => break,
                Some(Reverse(node)) if node.is_future() => break,
                Some(_) => {}
            }

            let value = match self.extract_min() {
                Ok(node) => node.into_value(),
                Err(err) => return Some(Err(err)),
            };

            if let Some(incoming) = self.input.next() {
                let node = if incoming < value {
                    HeapNode::Future(incoming)
                } else {
                    HeapNode::Current(incoming)
                };
                if let Err(err) = self.insert(node) {
                    return Some(Err(err));
                }
            }

            records.push(value);
        }

        log::debug!("run closed ({} records)", records.len());

        return Some(Ok(Run::Real(records)));
    }
}

/// Reorders a record stream into ascending runs by replacement selection,
/// using at most `memory_size` records of working memory.
///
/// An empty stream yields no runs; a stream of at most `memory_size` records
/// yields exactly one fully sorted run.
pub fn generate_runs<T, I>(records: I, memory_size: usize) -> Result<Vec<Run<T>>, HeapError>
where
    T: Ord,
    I: IntoIterator<Item = T>,
{
    SelectionHeap::new(records.into_iter(), memory_size)?.collect()
}
