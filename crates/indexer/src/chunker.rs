use crate::{IndexerError, Result};
use std::iter::{FusedIterator, Map};

/// One application item and the documents it contributes to the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexItem<K, D> {
    pub key: K,
    pub documents: Vec<D>,
}

impl<K, D> IndexItem<K, D> {
    pub fn new(key: K, documents: Vec<D>) -> Self {
        Self { key, documents }
    }

    pub fn single(key: K, document: D) -> Self {
        Self {
            key,
            documents: vec![document],
        }
    }
}

/// A bounded, order-preserving group of items processed as one unit of work.
pub type Chunk<K, D> = Vec<IndexItem<K, D>>;

/// Lazy fixed-size partitioning of an iterator. See [`chunk`].
#[derive(Debug, Clone)]
pub struct Chunks<I> {
    iter: I,
    size: usize,
}

/// Split `items` into consecutive chunks of `chunk_size` elements.
///
/// The last chunk may be shorter; an empty input yields no chunks. A zero `chunk_size` is
/// rejected before anything is pulled from `items`.
pub fn chunk<I>(items: I, chunk_size: usize) -> Result<Chunks<I::IntoIter>>
where
    I: IntoIterator,
{
    if chunk_size == 0 {
        return Err(IndexerError::invalid_config("chunk size must be > 0"));
    }
    Ok(Chunks {
        iter: items.into_iter(),
        size: chunk_size,
    })
}

/// Map every item to its index entry, then chunk the entries.
pub fn map_to_chunks<T, K, D, I, F>(
    items: I,
    mapper: F,
    chunk_size: usize,
) -> Result<Chunks<Map<I::IntoIter, F>>>
where
    I: IntoIterator<Item = T>,
    F: FnMut(T) -> IndexItem<K, D>,
{
    chunk(items.into_iter().map(mapper), chunk_size)
}

impl<I> Chunks<I> {
    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.size
    }
}

impl<I: Iterator> Iterator for Chunks<I> {
    type Item = Vec<I::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        let first = self.iter.next()?;
        let mut chunk = Vec::with_capacity(self.size.min(1024));
        chunk.push(first);
        chunk.extend(self.iter.by_ref().take(self.size - 1));
        Some(chunk)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let (lower, upper) = self.iter.size_hint();
        (lower.div_ceil(self.size), upper.map(|n| n.div_ceil(self.size)))
    }
}

impl<I: FusedIterator> FusedIterator for Chunks<I> {}
