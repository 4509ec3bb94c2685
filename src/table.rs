use std::ops::Index;

use crate::utils::{mix, MyHash};

#[derive(Clone)]
struct Entry<T> {
    value: T,
    next: usize,
}

/// Hash-consing table with chained buckets.
///
/// Values are never removed. The bucket array doubles whenever the number of
/// stored values exceeds it, and the table refuses to grow past `limit` values.
pub struct Table<T> {
    /// Cell 0 is a sentry so that index 0 can mean "end of chain".
    data: Vec<Entry<T>>,
    buckets: Vec<usize>,
    bitmask: u64,
    limit: usize,
}

/// The table already holds its maximum number of values.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct TableFull;

impl<T> Table<T>
where
    T: Default,
{
    /// Create a new table with `2^bits` initial buckets holding at most `limit` values.
    pub fn new(bits: usize, limit: usize) -> Self {
        assert!(bits <= 31, "Bucket bits should be in the range 0..=31");

        let buckets_size = 1 << bits;
        Self {
            data: vec![Entry {
                value: T::default(),
                next: 0,
            }],
            buckets: vec![0; buckets_size],
            bitmask: (buckets_size - 1) as u64,
            limit,
        }
    }
}

impl<T> Table<T> {
    /// Get the number of stored values.
    pub fn size(&self) -> usize {
        self.data.len() - 1
    }
    /// Get the maximum number of values.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Get the reference to the value at the given index.
    pub fn value(&self, index: usize) -> &T {
        assert_ne!(index, 0, "Index is 0");
        &self.data[index].value
    }

    /// Add a new value without hash-consing and return its index.
    ///
    /// The value does not take part in lookups by `put`.
    pub fn add(&mut self, value: T) -> Result<usize, TableFull> {
        if self.size() >= self.limit {
            return Err(TableFull);
        }
        self.data.push(Entry { value, next: 0 });
        Ok(self.data.len() - 1)
    }
}

impl<T> Table<T>
where
    T: MyHash + Eq,
{
    fn bucket_index(&self, value: &T) -> usize {
        (mix(value.hash()) & self.bitmask) as usize
    }

    /// Put a value into the table and return its index, reusing an equal value if present.
    pub fn put(&mut self, value: T) -> Result<usize, TableFull> {
        let bucket = self.bucket_index(&value);
        let mut index = self.buckets[bucket];
        while index != 0 {
            if self.data[index].value == value {
                return Ok(index);
            }
            index = self.data[index].next;
        }

        let i = self.add(value)?;
        self.data[i].next = self.buckets[bucket];
        self.buckets[bucket] = i;

        if self.size() > self.buckets.len() {
            self.grow();
        }
        Ok(i)
    }

    fn grow(&mut self) {
        let size = self.buckets.len() * 2;
        self.buckets = vec![0; size];
        self.bitmask = (size - 1) as u64;
        for i in 1..self.data.len() {
            let bucket = self.bucket_index(&self.data[i].value);
            self.data[i].next = self.buckets[bucket];
            self.buckets[bucket] = i;
        }
    }
}

impl<T> Index<usize> for Table<T> {
    type Output = T;

    fn index(&self, index: usize) -> &Self::Output {
        self.value(index)
    }
}
