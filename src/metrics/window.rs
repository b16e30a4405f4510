use std::collections::VecDeque;

/// Returned when a window holds no samples yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("no data")]
pub struct NoData;

/// Fixed-capacity FIFO of samples, oldest evicted first.
///
/// The capacity follows the plot it feeds: two samples per character column.
/// A capacity of zero retains nothing.
///
/// # Examples
///
/// ```
/// # use stackscope::metrics::MetricWindow;
/// let mut window = MetricWindow::new(3);
/// for value in 1..=5 {
///     window.push(value);
/// }
/// assert_eq!(window.to_vec(), vec![3, 4, 5]);
/// assert_eq!(window.newest(), Ok(&5));
/// assert_eq!(window.oldest(), Ok(&3));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct MetricWindow<T> {
    samples: VecDeque<T>,
    capacity: usize,
}

impl<T> MetricWindow<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// A window sized for a plot `width` character columns wide.
    pub fn for_width(width: usize) -> Self {
        Self::new(width.saturating_mul(2))
    }

    /// Appends a sample, evicting from the front until the length fits the capacity.
    pub fn push(&mut self, value: T) {
        self.samples.push_back(value);
        self.evict();
    }

    /// Changes the capacity. A smaller capacity drops the oldest samples right away.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
        self.evict();
    }

    fn evict(&mut self) {
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Samples ordered oldest to newest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.samples.iter()
    }

    /// The most recently pushed sample.
    pub fn newest(&self) -> Result<&T, NoData> {
        self.samples.back().ok_or(NoData)
    }

    /// The least recently pushed sample still retained.
    pub fn oldest(&self) -> Result<&T, NoData> {
        self.samples.front().ok_or(NoData)
    }
}

impl<T: Clone> MetricWindow<T> {
    /// Copies the samples out, oldest to newest.
    pub fn to_vec(&self) -> Vec<T> {
        self.samples.iter().cloned().collect()
    }
}

impl<T: Copy + PartialOrd> MetricWindow<T> {
    /// Largest retained sample.
    pub fn max(&self) -> Result<T, NoData> {
        let mut iter = self.samples.iter().copied();
        let first = iter.next().ok_or(NoData)?;
        Ok(iter.fold(first, |max, v| if v > max { v } else { max }))
    }
}
