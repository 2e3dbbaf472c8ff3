//! Bounded collection helpers.

use std::collections::VecDeque;

/// Push onto the back, evicting from the front once `max_size` is reached.
pub(crate) trait BoundedPush<T> {
    fn push_bounded(&mut self, value: T, max_size: usize);
}

impl<T> BoundedPush<T> for VecDeque<T> {
    #[inline]
    fn push_bounded(&mut self, value: T, max_size: usize) {
        while self.len() >= max_size.max(1) {
            self.pop_front();
        }
        self.push_back(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_oldest_first() {
        let mut q = VecDeque::new();
        for i in 0..5 {
            q.push_bounded(i, 3);
        }
        assert_eq!(q.into_iter().collect::<Vec<_>>(), vec![2, 3, 4]);
    }
}
