//! Prototype dictionary: numeric ids to prototype names, per category.

mod categories;

pub use categories::Category;

use ahash::AHashMap;
use tokio::io::AsyncRead;
use tracing::{debug, warn};

use crate::codec::reader::labeled;
use crate::codec::{LengthWidth, StreamReader};
use crate::error::Result;

/// One named prototype from the dictionary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrototypeEntry {
    pub category: Category,
    /// Dictionary group the entry was listed under, e.g. `blueprint-book`.
    pub group: String,
    pub name: String,
    pub id: u16,
}

/// Entry from a group with no known category. Kept, but never resolvable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnclassifiedEntry {
    pub group: String,
    pub name: String,
    pub id: u16,
}

/// Id resolution table for one decode session. Read-only once built.
#[derive(Debug, Default)]
pub struct PrototypeIndex {
    header: String,
    reserved: (u16, String),
    entries: Vec<PrototypeEntry>,
    lookup: AHashMap<(Category, u16), usize>,
    unclassified: Vec<UnclassifiedEntry>,
}

impl PrototypeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the dictionary block.
    pub async fn read<R>(reader: &mut StreamReader<'_, R>) -> Result<Self>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut index = Self::new();

        let group_count = labeled!(reader, "IndexSize", reader.read_u16().await?);
        index.header = labeled!(reader, "header", reader.read_string().await?);
        let reserved_id = labeled!(reader, "reserved-id", reader.read_u16().await?);
        let reserved_name = labeled!(reader, "reserved-name", reader.read_string().await?);
        index.reserved = (reserved_id, reserved_name);

        for _ in 1..group_count {
            let group = labeled!(reader, "Prototype", reader.read_string().await?);
            let (id_width, len_width) = if group == "quality" {
                (1, LengthWidth::U8)
            } else {
                (2, LengthWidth::U16)
            };

            let pairs = reader
                .read_array(len_width, move |r, i| Box::pin(read_pair(r, id_width, i)))
                .await?;

            if Category::of_group(&group).is_none() {
                debug!(group = %group, entries = pairs.len(), "unclassified prototype group");
            }
            for (id, name) in pairs {
                index.insert(&group, id, name);
            }
        }

        debug!(
            groups = group_count,
            entries = index.entries.len(),
            unclassified = index.unclassified.len(),
            "read prototype dictionary"
        );
        Ok(index)
    }

    /// Add an entry under `group`. The first entry for a `(category, id)` wins.
    pub fn insert(&mut self, group: &str, id: u16, name: String) {
        let Some(category) = Category::of_group(group) else {
            self.unclassified.push(UnclassifiedEntry {
                group: group.to_owned(),
                name,
                id,
            });
            return;
        };

        if let Some(&existing) = self.lookup.get(&(category, id)) {
            warn!(
                %category,
                id,
                kept = %self.entries[existing].name,
                dropped = %name,
                "duplicate prototype id"
            );
            return;
        }
        self.lookup.insert((category, id), self.entries.len());
        self.entries.push(PrototypeEntry {
            category,
            group: group.to_owned(),
            name,
            id,
        });
    }

    pub fn resolve(&self, category: Category, id: u16) -> Option<&PrototypeEntry> {
        self.lookup.get(&(category, id)).map(|&i| &self.entries[i])
    }

    /// Entries of one category, in dictionary order.
    pub fn entries(&self, category: Category) -> impl Iterator<Item = &PrototypeEntry> {
        self.entries.iter().filter(move |e| e.category == category)
    }

    pub fn unclassified(&self) -> &[UnclassifiedEntry] {
        &self.unclassified
    }

    pub fn header(&self) -> &str {
        &self.header
    }

    pub fn reserved(&self) -> (u16, &str) {
        (self.reserved.0, &self.reserved.1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

async fn read_pair<R>(reader: &mut StreamReader<'_, R>, id_width: usize, slot: usize) -> Result<(u16, String)>
where
    R: AsyncRead + Unpin + Send,
{
    let slot = format!("[{slot:>2}]");
    reader.push_label(&slot);
    let id = labeled!(reader, "id", reader.read_fixed_uint(id_width).await?) as u16;
    let name = labeled!(reader, "name", reader.read_string().await?);
    reader.pop_label(&slot);
    Ok((id, name))
}
