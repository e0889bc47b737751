// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! A dense growable bit set used as the large representation of points-to sets.
//! Only the monotone operations the solver needs are provided.

use std::fmt;
use std::fmt::Debug;
use std::marker::PhantomData;
use std::slice;

use rustc_index::Idx;

type Word = u64;
const WORD_BITS: usize = Word::BITS as usize;

#[derive(Eq, PartialEq, Hash)]
pub struct BitVec<T> {
    words: Vec<Word>,
    marker: PhantomData<T>,
}

impl<T: Idx> BitVec<T> {
    #[inline]
    pub fn new_empty() -> BitVec<T> {
        BitVec {
            words: Vec::new(),
            marker: PhantomData,
        }
    }

    /// Grows the underlying storage so that `capacity` bits are addressable.
    #[inline]
    fn ensure(&mut self, capacity: usize) {
        let min_words = (capacity + WORD_BITS - 1) / WORD_BITS;
        if self.words.len() < min_words {
            self.words.resize(min_words, 0)
        }
    }

    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    #[inline]
    pub fn contains(&self, elem: T) -> bool {
        let (word_index, mask) = word_index_and_mask(elem);
        match self.words.get(word_index) {
            Some(word) => word & mask != 0,
            None => false,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    /// Insert `elem`. Returns whether the set has changed.
    #[inline]
    pub fn insert(&mut self, elem: T) -> bool {
        self.ensure(elem.index() + 1);
        let (word_index, mask) = word_index_and_mask(elem);
        let word = &mut self.words[word_index];
        let changed = *word & mask == 0;
        *word |= mask;
        changed
    }

    /// Removes `elem`. Returns whether the set has changed.
    #[inline]
    pub fn remove(&mut self, elem: T) -> bool {
        let (word_index, mask) = word_index_and_mask(elem);
        match self.words.get_mut(word_index) {
            Some(word) => {
                let changed = *word & mask != 0;
                *word &= !mask;
                changed
            }
            None => false,
        }
    }

    /// Is `self` a superset of `other`?
    pub fn superset(&self, other: &BitVec<T>) -> bool {
        other.words.iter().enumerate().all(|(i, word)| {
            let mine = self.words.get(i).copied().unwrap_or(0);
            word & !mine == 0
        })
    }

    /// Iterates over the set bits in ascending order.
    #[inline]
    pub fn iter(&self) -> BitIter<'_, T> {
        BitIter {
            word: 0,
            base: 0,
            first: true,
            words: self.words.iter(),
            marker: PhantomData,
        }
    }

    /// `self |= other`. Returns whether `self` has changed.
    pub fn union(&mut self, other: &BitVec<T>) -> bool {
        self.ensure(other.words.len() * WORD_BITS);
        let mut changed = 0;
        for (out, word) in self.words.iter_mut().zip(&other.words) {
            let old = *out;
            *out |= *word;
            changed |= old ^ *out;
        }
        changed != 0
    }

    /// `self &= !other`. Returns whether `self` has changed.
    pub fn subtract(&mut self, other: &BitVec<T>) -> bool {
        let mut changed = 0;
        for (out, word) in self.words.iter_mut().zip(&other.words) {
            let old = *out;
            *out &= !*word;
            changed |= old ^ *out;
        }
        changed != 0
    }
}

impl<T> Clone for BitVec<T> {
    fn clone(&self) -> Self {
        BitVec {
            words: self.words.clone(),
            marker: PhantomData,
        }
    }
}

impl<T: Idx> Debug for BitVec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

pub struct BitIter<'a, T: Idx> {
    /// The current word with the already visited bits cleared.
    word: Word,
    /// Bit offset of `word`.
    base: usize,
    first: bool,
    words: slice::Iter<'a, Word>,
    marker: PhantomData<T>,
}

impl<'a, T: Idx> Iterator for BitIter<'a, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        while self.word == 0 {
            self.word = *self.words.next()?;
            if self.first {
                self.first = false;
            } else {
                self.base += WORD_BITS;
            }
        }
        let bit_pos = self.word.trailing_zeros() as usize;
        self.word &= self.word - 1;
        Some(T::new(self.base + bit_pos))
    }
}

#[inline]
fn word_index_and_mask<T: Idx>(elem: T) -> (usize, Word) {
    let elem = elem.index();
    (elem / WORD_BITS, 1 << (elem % WORD_BITS))
}
