use ahash::AHashMap;
use tokio::io::AsyncRead;
use tracing::trace;

use super::types::*;
use crate::codec::reader::labeled;
use crate::codec::{BoxFuture, LengthWidth, SignalType, StreamReader};
use crate::error::{Error, Result};
use crate::prototype::{Category, PrototypeEntry, PrototypeIndex};

struct Header {
    generation: u32,
    label: String,
}

/// How many books may be nested inside one another by default.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Recursive decoder for library slots. Ids resolve against `index`.
pub struct LibraryDecoder<'s, 'o, R> {
    reader: &'s mut StreamReader<'o, R>,
    index: &'s PrototypeIndex,
    depth: usize,
    max_depth: usize,
}

impl<'s, 'o, R: AsyncRead + Unpin + Send> LibraryDecoder<'s, 'o, R> {
    pub fn new(reader: &'s mut StreamReader<'o, R>, index: &'s PrototypeIndex) -> Self {
        Self {
            reader,
            index,
            depth: 0,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Limit book nesting. Each level costs stack while the nested futures are polled.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Same contract as [`StreamReader::read_array`], with the decoder as context.
    async fn read_array<T, F>(&mut self, width: LengthWidth, mut element: F) -> Result<Vec<T>>
    where
        F: for<'a> FnMut(&'a mut Self, usize) -> BoxFuture<'a, Result<T>>,
    {
        let len = self.reader.read_array_len(width).await?;
        let mut out = Vec::with_capacity(len.min(1024));
        for i in 0..len {
            out.push(element(&mut *self, i).await?);
        }
        Ok(out)
    }

    /// Library array: a `u32` slot count, then one slot per position.
    pub async fn read_library(&mut self) -> Result<Vec<Option<LibraryEntry>>> {
        self.reader.push_label("LibObj");
        let slots = self
            .read_array(LengthWidth::U32, |d, _| d.decode_library_entry())
            .await?;
        self.reader.pop_label("LibObj");
        Ok(slots)
    }

    /// One library slot. `None` for an unused slot.
    pub fn decode_library_entry(&mut self) -> BoxFuture<'_, Result<Option<LibraryEntry>>> {
        Box::pin(self.decode_slot())
    }

    async fn decode_slot(&mut self) -> Result<Option<LibraryEntry>> {
        let used = labeled!(self.reader, "slot-used", self.reader.read_bool().await?);
        if !used {
            self.reader.annotate(format_args!("not used"));
            return Ok(None);
        }
        self.reader.annotate(format_args!("used"));

        let kind = labeled!(
            self.reader,
            "entity-type",
            self.reader
                .read_mapped("library object type", 1, &LibraryKind::ALL)
                .await?
        );
        trace!(?kind, offset = self.reader.position(), "library entry");

        let entry = match kind {
            LibraryKind::Blueprint => LibraryEntry::Blueprint(self.decode_blueprint().await?),
            LibraryKind::BlueprintBook => LibraryEntry::BlueprintBook(self.decode_book().await?),
            LibraryKind::DeconstructionPlanner => {
                LibraryEntry::DeconstructionPlanner(self.decode_deconstruction().await?)
            }
            LibraryKind::UpgradePlanner => {
                LibraryEntry::UpgradePlanner(self.decode_upgrade().await?)
            }
        };
        Ok(Some(entry))
    }

    /// Read an id of the category's width and look it up. Misses are not errors here.
    async fn read_entry(&mut self, category: Category) -> Result<(u16, Option<&'s PrototypeEntry>)> {
        let id = self.reader.read_fixed_uint(category.id_width()).await? as u16;
        let index = self.index;
        let entry = index.resolve(category, id);
        self.reader
            .annotate(format_args!("{}", entry.map_or("null", |e| e.name.as_str())));
        Ok((id, entry))
    }

    async fn require_entry(&mut self, category: Category) -> Result<&'s PrototypeEntry> {
        let (id, entry) = self.read_entry(category).await?;
        entry.ok_or(Error::UnresolvedReference { category, id })
    }

    async fn read_header(&mut self, kind: LibraryKind) -> Result<Header> {
        self.reader.push_label("header");
        let generation = labeled!(self.reader, "generation", self.reader.read_u32().await?);
        let entry = labeled!(self.reader, "entry", self.require_entry(Category::Item).await?);
        if entry.group != kind.expected_group() {
            return Err(Error::PrototypeMismatch {
                expected: kind.expected_group(),
                found: entry.group.clone(),
            });
        }
        let label = labeled!(self.reader, "label", self.reader.read_string().await?);
        self.reader.pop_label("header");
        Ok(Header { generation, label })
    }

    async fn read_description(&mut self) -> Result<String> {
        Ok(labeled!(self.reader, "description", self.reader.read_string().await?))
    }

    async fn decode_blueprint(&mut self) -> Result<Blueprint> {
        self.reader.push_label("Blueprint");
        let header = self.read_header(LibraryKind::Blueprint).await?;
        self.reader.expect("Expect 0", &[0x00]).await?;
        let removed_mods = labeled!(self.reader, "removed mods", self.reader.read_bool().await?);
        let len = labeled!(
            self.reader,
            "DataLength",
            self.reader.read_flexible_count().await?
        );
        let payload = labeled!(
            self.reader,
            "UnparsedData",
            self.reader.read_bytes(len as usize).await?
        );
        self.reader.pop_label("Blueprint");

        Ok(Blueprint {
            generation: header.generation,
            label: header.label,
            description: None,
            removed_mods,
            payload,
        })
    }

    async fn decode_book(&mut self) -> Result<BlueprintBook> {
        self.reader.push_label("BB");
        let header = self.read_header(LibraryKind::BlueprintBook).await?;
        let description = self.read_description().await?;
        let icons = self.read_icons().await?;

        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(Error::NestingTooDeep { depth: self.depth });
        }
        let children = self.read_library().await?;
        self.depth -= 1;

        self.reader.push_label("activeIndex");
        let active_index = if self.reader.version().has_quality() {
            self.reader.read_u16().await?
        } else {
            let index = self.reader.read_u8().await?;
            self.reader.expect("activeIndex-high", &[0x00]).await?;
            index as u16
        };
        self.reader.pop_label("activeIndex");
        self.reader.pop_label("BB");

        Ok(BlueprintBook {
            generation: header.generation,
            label: header.label,
            description,
            icons,
            children,
            active_index,
        })
    }

    async fn decode_deconstruction(&mut self) -> Result<DeconstructionPlanner> {
        self.reader.push_label("Decon");
        let header = self.read_header(LibraryKind::DeconstructionPlanner).await?;
        let description = self.read_description().await?;
        let icons = self.read_icons().await?;

        let entity_filter_mode = labeled!(self.reader, "EFMode", self.reader.read_u8().await?);
        let entity_filters = labeled!(self.reader, "EF", self.read_filters(Category::Entity).await?);
        let trees_rocks_only = labeled!(self.reader, "TROnly", self.reader.read_bool().await?);

        let tile_filter_mode = labeled!(self.reader, "TFMode", self.reader.read_u8().await?);
        let tile_selection_mode = labeled!(self.reader, "TSMode", self.reader.read_u8().await?);
        let tile_filters = labeled!(self.reader, "TF", self.read_filters(Category::Tile).await?);
        self.reader.pop_label("Decon");

        Ok(DeconstructionPlanner {
            generation: header.generation,
            label: header.label,
            description,
            icons,
            entity_filter_mode,
            entity_filters,
            trees_rocks_only,
            tile_filter_mode,
            tile_selection_mode,
            tile_filters,
        })
    }

    async fn decode_upgrade(&mut self) -> Result<UpgradePlanner> {
        self.reader.push_label("UpgradeItem");
        let header = self.read_header(LibraryKind::UpgradePlanner).await?;
        let description = self.read_description().await?;
        let icons = self.read_icons().await?;

        self.reader.push_label("unknowns");
        let unknown_overrides = self
            .read_array(LengthWidth::U8, |d, _| Box::pin(d.read_upgrade_override()))
            .await?;
        self.reader.pop_label("unknowns");

        self.reader.push_label("mappers");
        let mappers = self
            .read_array(LengthWidth::U8, |d, i| Box::pin(d.read_mapper(i)))
            .await?;
        self.reader.pop_label("mappers");
        self.reader.pop_label("UpgradeItem");

        Ok(UpgradePlanner {
            generation: header.generation,
            label: header.label,
            description,
            icons,
            unknown_overrides,
            mappers,
        })
    }

    async fn read_upgrade_override(&mut self) -> Result<UpgradeOverride> {
        let name = labeled!(self.reader, "name", self.reader.read_string().await?);
        let is_to = labeled!(self.reader, "isTo", self.reader.read_bool().await?);
        let index = labeled!(self.reader, "index", self.reader.read_u16().await?);
        Ok(UpgradeOverride {
            index,
            name,
            side: if is_to { MapperSide::To } else { MapperSide::From },
        })
    }

    async fn read_mapper(&mut self, slot: usize) -> Result<Mapper> {
        let from = labeled!(self.reader, "from", self.read_mapper_target().await?);
        let to = labeled!(self.reader, "to", self.read_mapper_target().await?);
        Ok(Mapper {
            index: slot as u16,
            from,
            to,
        })
    }

    async fn read_mapper_target(&mut self) -> Result<MapperTarget> {
        let is_item = labeled!(self.reader, "isItem", self.reader.read_bool().await?);
        let kind = if is_item { Category::Item } else { Category::Entity };
        let entry = labeled!(self.reader, "entry", self.require_entry(kind).await?);
        Ok(MapperTarget {
            kind,
            name: entry.name.clone(),
        })
    }

    async fn read_icons(&mut self) -> Result<Vec<Icon>> {
        self.reader.push_label("unknownIcons");
        let overrides = self
            .reader
            .read_array(LengthWidth::U8, |r, _| Box::pin(r.read_string()))
            .await?;
        self.reader.pop_label("unknownIcons");

        self.reader.push_label("icons");
        let signals = self
            .read_array(LengthWidth::U8, |d, _| Box::pin(d.read_signal()))
            .await?;
        self.reader.pop_label("icons");

        Ok(signals
            .into_iter()
            .enumerate()
            .filter_map(|(i, signal)| {
                let mut signal = signal?;
                if let Some(name) = overrides.get(i).filter(|n| !n.is_empty()) {
                    signal.name = name.clone();
                }
                Some(Icon {
                    index: i as u16 + 1,
                    signal,
                })
            })
            .collect())
    }

    async fn read_signal(&mut self) -> Result<Option<Signal>> {
        self.reader.push_label("signal");
        let kind = labeled!(
            self.reader,
            "type",
            self.reader
                .read_mapped("signal type", 1, &SignalType::ALL)
                .await?
        );
        self.reader.annotate(format_args!("{kind}"));
        let (_, entry) = labeled!(self.reader, "entry", self.read_entry(kind.into()).await?);
        self.reader.pop_label("signal");

        Ok(entry.map(|e| Signal {
            kind,
            name: e.name.clone(),
        }))
    }

    async fn read_index_name(&mut self) -> Result<Filter> {
        let index = labeled!(self.reader, "index", self.reader.read_u16().await?);
        let name = labeled!(self.reader, "name", self.reader.read_string().await?);
        Ok(Filter { index, name })
    }

    async fn read_filter_slot(&mut self, category: Category, slot: usize) -> Result<Option<Filter>> {
        let (_, entry) = labeled!(self.reader, "UnknownEntry", self.read_entry(category).await?);
        Ok(entry.map(|e| Filter {
            index: slot as u16,
            name: e.name.clone(),
        }))
    }

    async fn read_filters(&mut self, category: Category) -> Result<FilterSet> {
        let label = format!("readFilters({category})");
        self.reader.push_label(&label);

        self.reader.push_label("unknowns");
        let overrides: AHashMap<u16, String> = self
            .read_array(LengthWidth::U8, |d, _| Box::pin(d.read_index_name()))
            .await?
            .into_iter()
            .map(|f| (f.index, f.name))
            .collect();
        self.reader.pop_label("unknowns");

        self.reader.push_label("Filters");
        let slots = self
            .read_array(LengthWidth::U8, move |d, i| Box::pin(d.read_filter_slot(category, i)))
            .await?;
        self.reader.pop_label("Filters");

        let entries = slots
            .into_iter()
            .flatten()
            .map(|mut filter: Filter| {
                if let Some(replacement) = overrides.get(&filter.index).filter(|n| !n.is_empty()) {
                    filter.name = replacement.clone();
                }
                filter
            })
            .collect();

        let quality = if self.reader.version().has_quality() {
            self.reader.push_label("Quality");
            let quality = self
                .read_array(LengthWidth::U8, |d, _| Box::pin(d.read_index_name()))
                .await?;
            self.reader.pop_label("Quality");
            quality
        } else {
            Vec::new()
        };

        self.reader.pop_label(&label);
        Ok(FilterSet { entries, quality })
    }
}
