use std::cell::OnceCell;
use std::slice::{Chunks, IterMut};

pub(crate) struct ThreadLocal<T>(OnceCell<T>);

impl<T> ThreadLocal<T> {
    #[inline(always)]
    pub fn new() -> Self {
        Self(OnceCell::new())
    }

    #[inline(always)]
    pub fn get_or(&self, f: impl FnOnce() -> T) -> &T {
        self.0.get_or_init(f)
    }
}

impl<T> IntoIterator for ThreadLocal<T> {
    type Item = T;

    type IntoIter = std::option::IntoIter<T>;

    #[inline(always)]
    fn into_iter(mut self) -> Self::IntoIter {
        self.0.take().into_iter()
    }
}

pub(crate) trait FakeRayonSlice<T> {
    fn par_chunks(&self, chunk_size: usize) -> Chunks<'_, T>;
}

impl<T> FakeRayonSlice<T> for [T] {
    #[inline(always)]
    fn par_chunks(&self, chunk_size: usize) -> Chunks<'_, T> {
        self.chunks(chunk_size)
    }
}

pub(crate) trait FakeRayonSliceMut<T> {
    fn par_iter_mut(&mut self) -> IterMut<'_, T>;
}

impl<T> FakeRayonSliceMut<T> for [T] {
    #[inline(always)]
    fn par_iter_mut(&mut self) -> IterMut<'_, T> {
        self.iter_mut()
    }
}
