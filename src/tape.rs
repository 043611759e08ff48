//! A windowed view over an ordered sequence.
//!
//! [`Tape`] is an ordinary FIFO-capable sequence with two pieces of display
//! state on top: an optional head cursor and a window size. Neither affects
//! what can be stored; they only decide which slice [`Tape::window`] shows.

use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum TapeError {
    #[display("Tape is empty")]
    Empty,
    #[display("Tape head is unset")]
    NoHead,
    #[display("Window size must be positive")]
    ZeroWindow,
    #[display("Index {index} out of range for tape of length {len}")]
    OutOfRange { index: usize, len: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tape<T> {
    items: VecDeque<T>,
    head: Option<usize>,
    window_size: usize,
}

impl<T> Tape<T> {
    pub fn new(window_size: usize) -> Result<Self, TapeError> {
        NonZeroUsize::new(window_size)
            .map(Self::with_window)
            .ok_or(TapeError::ZeroWindow)
    }

    pub fn with_window(window_size: NonZeroUsize) -> Self {
        Self {
            items: VecDeque::new(),
            head: None,
            window_size: window_size.get(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn add(&mut self, item: T) {
        self.items.push_back(item);
    }

    pub fn remove(&mut self, index: usize) -> Result<T, TapeError> {
        let len = self.items.len();
        self.items
            .remove(index)
            .ok_or(TapeError::OutOfRange { index, len })
    }

    /// Removes the oldest item.
    pub fn pop_front(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    /// Drops every item. The head cursor is kept.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Moves the items out in insertion order, leaving the tape empty.
    pub fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
        self.items.drain(..)
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator + '_ {
        self.items.iter()
    }

    pub fn contains(&self, item: &T) -> bool
    where
        T: PartialEq,
    {
        self.items.contains(item)
    }

    /// Sets the head, wrapping around the current length.
    pub fn set_head(&mut self, index: usize) {
        self.head = Some(match self.items.len() {
            0 => 0,
            len => index % len,
        });
    }

    pub fn clear_head(&mut self) {
        self.head = None;
    }

    /// The head index, re-wrapped if items were removed since it was set.
    pub fn head_index(&self) -> Option<usize> {
        match (self.head, self.items.len()) {
            (Some(_), 0) => Some(0),
            (Some(head), len) => Some(head % len),
            (None, _) => None,
        }
    }

    pub fn head(&self) -> Result<&T, TapeError> {
        if self.items.is_empty() {
            return Err(TapeError::Empty);
        }
        let index = self.head_index().ok_or(TapeError::NoHead)?;
        Ok(&self.items[index])
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn set_window_size(&mut self, window_size: usize) -> Result<(), TapeError> {
        if window_size == 0 {
            return Err(TapeError::ZeroWindow);
        }
        self.window_size = window_size;
        Ok(())
    }

    /// Indices currently in view.
    ///
    /// Without a head the most recent items are shown. With one, the window is
    /// centered on it and shifted to stay inside the tape.
    pub fn window_range(&self) -> Range<usize> {
        let len = self.items.len();
        let size = self.window_size.min(len);
        let start = match self.head_index() {
            None => len - size,
            Some(head) => head.saturating_sub(self.window_size / 2).min(len - size),
        };
        start..start + size
    }

    pub fn window(&self) -> impl Iterator<Item = (usize, &T)> + '_ {
        let range = self.window_range();
        self.items.range(range.clone()).zip(range).map(|(item, i)| (i, item))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tape_of(window_size: usize, items: impl IntoIterator<Item = u32>) -> Tape<u32> {
        let mut tape = Tape::new(window_size).unwrap();
        for item in items {
            tape.add(item);
        }
        tape
    }

    #[test]
    fn test_zero_window_is_rejected() {
        assert_eq!(Tape::<u32>::new(0).unwrap_err(), TapeError::ZeroWindow);
        let mut tape = tape_of(3, 0..5);
        assert_eq!(tape.set_window_size(0), Err(TapeError::ZeroWindow));
        assert_eq!(tape.window_size(), 3);
    }

    #[test]
    fn test_fifo_removal() {
        let mut tape = tape_of(3, [10, 20, 30]);
        assert_eq!(tape.remove(0), Ok(10));
        assert_eq!(tape.pop_front(), Some(20));
        assert_eq!(tape.remove(5), Err(TapeError::OutOfRange { index: 5, len: 1 }));
        assert_eq!(tape.iter().copied().collect::<Vec<_>>(), [30]);
    }

    #[test]
    fn test_head_wraps() {
        let mut tape = tape_of(3, 0..4);
        tape.set_head(6);
        assert_eq!(tape.head_index(), Some(2));
        assert_eq!(tape.head(), Ok(&2));

        tape.remove(3).unwrap();
        tape.remove(2).unwrap();
        assert_eq!(tape.head_index(), Some(0));

        let mut empty = Tape::<u32>::new(3).unwrap();
        empty.set_head(7);
        assert_eq!(empty.head_index(), Some(0));
        assert_eq!(empty.head(), Err(TapeError::Empty));
    }

    #[test]
    fn test_head_unset() {
        let mut tape = tape_of(3, 0..4);
        assert_eq!(tape.head(), Err(TapeError::NoHead));
        tape.set_head(1);
        tape.clear_head();
        assert_eq!(tape.head_index(), None);
    }

    #[test]
    fn test_window_without_head_shows_latest() {
        let tape = tape_of(3, 0..10);
        assert_eq!(tape.window_range(), 7..10);
        assert_eq!(
            tape.window().collect::<Vec<_>>(),
            [(7, &7), (8, &8), (9, &9)]
        );

        let short = tape_of(5, 0..2);
        assert_eq!(short.window_range(), 0..2);
    }

    #[test]
    fn test_window_centers_on_head() {
        let mut tape = tape_of(5, 0..10);
        tape.set_head(4);
        assert_eq!(tape.window_range(), 2..7);
        tape.set_head(0);
        assert_eq!(tape.window_range(), 0..5);
        tape.set_head(9);
        assert_eq!(tape.window_range(), 5..10);
    }

    #[test]
    fn test_empty_window() {
        let tape = Tape::<u32>::new(4).unwrap();
        assert_eq!(tape.window_range(), 0..0);
        assert_eq!(tape.window().count(), 0);
    }
}
