//! Test-only encoder for building synthetic storage streams.

use super::types::Version;

/// Appends values in the storage file's wire format.
#[derive(Debug, Default)]
pub struct StreamWriter {
    data: Vec<u8>,
}

impl StreamWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.data.extend_from_slice(bytes);
        self
    }

    pub fn write_u8(&mut self, v: u8) -> &mut Self {
        self.data.push(v);
        self
    }

    pub fn write_u16(&mut self, v: u16) -> &mut Self {
        self.write_bytes(&v.to_le_bytes())
    }

    pub fn write_u32(&mut self, v: u32) -> &mut Self {
        self.write_bytes(&v.to_le_bytes())
    }

    pub fn write_u64(&mut self, v: u64) -> &mut Self {
        self.write_bytes(&v.to_le_bytes())
    }

    pub fn write_bool(&mut self, v: bool) -> &mut Self {
        self.write_u8(v as u8)
    }

    /// Flexible-width count.
    pub fn write_count(&mut self, v: u32) -> &mut Self {
        if v < 0xFF {
            self.write_u8(v as u8)
        } else {
            self.write_u8(0xFF).write_u32(v)
        }
    }

    pub fn write_string(&mut self, s: &str) -> &mut Self {
        self.write_count(s.len() as u32).write_bytes(s.as_bytes())
    }

    /// Version header followed by the branch byte.
    pub fn write_version(&mut self, version: Version) -> &mut Self {
        self.write_u16(version.major)
            .write_u16(version.minor)
            .write_u16(version.patch)
            .write_u16(version.developer)
            .write_u8(version.branch)
    }

    /// Dictionary block: header string, reserved pair, then one entry per group.
    pub fn write_dictionary(&mut self, groups: &[(&str, &[(u16, &str)])]) -> &mut Self {
        self.write_u16(groups.len() as u16 + 1)
            .write_string("")
            .write_u16(0)
            .write_string("");
        for (group, entries) in groups {
            self.write_string(group);
            let narrow = *group == "quality";
            if narrow {
                self.write_u8(entries.len() as u8);
            } else {
                self.write_u16(entries.len() as u16);
            }
            for (id, name) in entries.iter() {
                if narrow {
                    self.write_u8(*id as u8);
                } else {
                    self.write_u16(*id);
                }
                self.write_string(name);
            }
        }
        self
    }
}
