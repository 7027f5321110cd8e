//! Typed transforms at the edge of the sparse pipeline.
//!
//! Ratings arrive as loosely typed tables. [`OneHotEncoder`] is the single
//! place where `(user, item, rating)` triples become [`SparseRow`]s, and
//! [`binarize_labels`] is the explicit rating-to-relevance step.

use serde::{Deserialize, Serialize};

use crate::sparse::{DataError, Result, SparseDataset, SparseRow};

/// One observed rating.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    /// User identifier, dense from zero.
    pub user_id: u32,
    /// Item identifier, dense from zero.
    pub item_id: u32,
    /// The rating value.
    pub rating: f32,
}

impl Rating {
    /// Creates a rating.
    pub fn new(user_id: u32, item_id: u32, rating: f32) -> Self {
        Self {
            user_id,
            item_id,
            rating,
        }
    }
}

/// One-hot encoder for user/item pairs.
///
/// Users occupy columns `0..num_users` and items occupy
/// `num_users..num_users + num_items`, so every row has exactly two nonzeros.
///
/// ```
/// use fmrec_data::transform::{OneHotEncoder, Rating};
///
/// let ratings = vec![Rating::new(0, 2, 4.0), Rating::new(1, 0, 3.0)];
/// let encoder = OneHotEncoder::fit(&ratings).unwrap();
/// assert_eq!(encoder.feature_count(), 2 + 3);
///
/// let dataset = encoder.transform(&ratings).unwrap();
/// assert_eq!(dataset.rows()[0].indices, vec![0, 4]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OneHotEncoder {
    num_users: u32,
    num_items: u32,
}

impl OneHotEncoder {
    /// Creates an encoder for known user and item counts.
    pub fn new(num_users: u32, num_items: u32) -> Result<Self> {
        num_users
            .checked_add(num_items)
            .ok_or(DataError::FeatureSpaceOverflow {
                users: num_users,
                items: num_items,
            })?;
        Ok(Self {
            num_users,
            num_items,
        })
    }

    /// Sizes the encoder from the largest identifiers in `ratings`.
    pub fn fit(ratings: &[Rating]) -> Result<Self> {
        if ratings.is_empty() {
            return Err(DataError::Empty);
        }
        let max_user = ratings.iter().map(|r| r.user_id).max().unwrap_or(0);
        let max_item = ratings.iter().map(|r| r.item_id).max().unwrap_or(0);

        let overflow = DataError::FeatureSpaceOverflow {
            users: max_user,
            items: max_item,
        };
        let num_users = max_user.checked_add(1).ok_or_else(|| overflow.clone())?;
        let num_items = max_item.checked_add(1).ok_or(overflow)?;
        Self::new(num_users, num_items)
    }

    /// Number of user columns.
    pub fn num_users(&self) -> u32 {
        self.num_users
    }

    /// Number of item columns.
    pub fn num_items(&self) -> u32 {
        self.num_items
    }

    /// Width of the encoded feature space.
    pub fn feature_count(&self) -> u32 {
        self.num_users + self.num_items
    }

    /// Column assigned to a user.
    pub fn user_column(&self, user_id: u32) -> Result<u32> {
        if user_id >= self.num_users {
            return Err(DataError::UnknownId {
                kind: "user",
                id: user_id,
                limit: self.num_users,
            });
        }
        Ok(user_id)
    }

    /// Column assigned to an item.
    pub fn item_column(&self, item_id: u32) -> Result<u32> {
        if item_id >= self.num_items {
            return Err(DataError::UnknownId {
                kind: "item",
                id: item_id,
                limit: self.num_items,
            });
        }
        Ok(self.num_users + item_id)
    }

    /// Encodes one rating.
    pub fn encode(&self, rating: &Rating) -> Result<SparseRow> {
        let user = self.user_column(rating.user_id)?;
        let item = self.item_column(rating.item_id)?;
        Ok(SparseRow {
            feature_count: self.feature_count(),
            indices: vec![user, item],
            values: vec![1.0, 1.0],
            label: rating.rating,
        })
    }

    /// Encodes every rating, preserving order.
    pub fn transform(&self, ratings: &[Rating]) -> Result<SparseDataset> {
        let rows = ratings
            .iter()
            .map(|r| self.encode(r))
            .collect::<Result<Vec<_>>>()?;
        tracing::debug!(
            rows = rows.len(),
            users = self.num_users,
            items = self.num_items,
            "One-hot encoded ratings"
        );
        Ok(SparseDataset::from_validated(self.feature_count(), rows))
    }
}

/// Maps each label to `1.0` when it is at least `threshold`, else `0.0`.
///
/// ```
/// use fmrec_data::sparse::{SparseDataset, SparseRow};
/// use fmrec_data::transform::binarize_labels;
///
/// let rows = vec![
///     SparseRow::one_hot(4, vec![0, 2], 5.0).unwrap(),
///     SparseRow::one_hot(4, vec![1, 3], 3.0).unwrap(),
/// ];
/// let dataset = SparseDataset::new(4, rows).unwrap();
/// assert_eq!(binarize_labels(&dataset, 4.0).labels(), vec![1.0, 0.0]);
/// ```
pub fn binarize_labels(dataset: &SparseDataset, threshold: f32) -> SparseDataset {
    dataset.map_labels(|label| if label >= threshold { 1.0 } else { 0.0 })
}
