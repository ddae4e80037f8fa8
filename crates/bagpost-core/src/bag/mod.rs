//! ROS bag v2.0 container: index reading, topic reads and buffered appends.
//!
//! Layout on disk:
//! 1. magic line
//! 2. bag header record (fixed 4096 bytes) pointing at the index section
//! 3. chunk records, each followed by one index-data record per connection
//! 4. index section: every connection record, then every chunk-info record
//!
//! Appends are buffered in memory. Finalizing truncates the old index
//! section, writes one new uncompressed chunk and rewrites the index and the
//! bag header. A bag that was never written to is left byte-for-byte intact.

pub mod msg;
pub mod record;
pub mod time;

pub use msg::{encode_string_message, Schema, Value};
pub use time::RosTime;

use record::{op, read_record, write_bag_header, write_record, Header, Record};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Cursor, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error};

#[derive(Error, Debug)]
pub enum BagError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("not a ROS bag v2.0 file")]
    BadMagic,

    #[error("bag index is missing; reindex the bag before processing it")]
    Unindexed,

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("missing header field '{0}'")]
    MissingField(String),

    #[error("unexpected record op 0x{found:02x} (expected 0x{expected:02x})")]
    UnexpectedOp { expected: u8, found: u8 },

    #[error("unsupported chunk compression '{0}'")]
    UnsupportedCompression(String),

    #[error("invalid message definition: {0}")]
    InvalidDefinition(String),

    #[error("message type '{0}' is not described by its connection")]
    UnknownType(String),

    #[error("message payload ended early")]
    TruncatedMessage,

    #[error("bag contains no messages")]
    Empty,

    #[error("bag was opened read-only")]
    ReadOnly,
}

/// Identity of a message type as stored in a connection record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageType<'a> {
    pub name: &'a str,
    pub md5sum: &'a str,
    pub definition: &'a str,
}

pub const STRING_MESSAGE: MessageType<'static> = MessageType {
    name: "std_msgs/String",
    md5sum: "992ce8a1687cec8c8bd883ec73ca41d1",
    definition: "string data\n",
};

#[derive(Debug, Clone)]
pub struct Connection {
    pub id: u32,
    pub topic: String,
    pub msg_type: String,
    pub md5sum: String,
    pub definition: String,
    fields: Header,
}

impl Connection {
    fn new(id: u32, topic: &str, msg_type: &MessageType<'_>) -> Self {
        let fields = Header::new()
            .with("topic", topic)
            .with("type", msg_type.name)
            .with("md5sum", msg_type.md5sum)
            .with("message_definition", msg_type.definition);
        Self {
            id,
            topic: topic.to_string(),
            msg_type: msg_type.name.to_string(),
            md5sum: msg_type.md5sum.to_string(),
            definition: msg_type.definition.to_string(),
            fields,
        }
    }

    fn from_record(record: &Record) -> Result<Self, BagError> {
        expect_op(&record.header, op::CONNECTION)?;
        let fields = Header::parse(&record.data)?;
        Ok(Self {
            id: record.header.u32("conn")?,
            topic: record.header.string("topic")?,
            msg_type: fields.string("type")?,
            md5sum: fields.string("md5sum").unwrap_or_default(),
            definition: fields.string("message_definition").unwrap_or_default(),
            fields,
        })
    }

    fn write<W: Write>(&self, writer: &mut W) -> io::Result<u64> {
        let header = Header::new()
            .with("op", [op::CONNECTION])
            .with("conn", self.id.to_le_bytes())
            .with("topic", self.topic.as_str());
        write_record(writer, &header, &self.fields.encode())
    }
}

#[derive(Debug, Clone)]
struct ChunkInfo {
    chunk_pos: u64,
    start_time: RosTime,
    end_time: RosTime,
    /// (connection id, message count) pairs.
    counts: Vec<(u32, u32)>,
}

impl ChunkInfo {
    fn from_record(record: &Record) -> Result<Self, BagError> {
        expect_op(&record.header, op::CHUNK_INFO)?;
        let count = record.header.u32("count")? as usize;
        if record.data.len() < count * 8 {
            return Err(BagError::InvalidRecord("chunk info data too short".into()));
        }
        let counts = record
            .data
            .chunks_exact(8)
            .take(count)
            .map(|pair| {
                (
                    u32::from_le_bytes([pair[0], pair[1], pair[2], pair[3]]),
                    u32::from_le_bytes([pair[4], pair[5], pair[6], pair[7]]),
                )
            })
            .collect();

        Ok(Self {
            chunk_pos: record.header.u64("chunk_pos")?,
            start_time: record.header.time("start_time")?,
            end_time: record.header.time("end_time")?,
            counts,
        })
    }

    fn write<W: Write>(&self, writer: &mut W) -> io::Result<u64> {
        let header = Header::new()
            .with("op", [op::CHUNK_INFO])
            .with("ver", 1u32.to_le_bytes())
            .with("chunk_pos", self.chunk_pos.to_le_bytes())
            .with("start_time", self.start_time.to_bytes())
            .with("end_time", self.end_time.to_bytes())
            .with("count", (self.counts.len() as u32).to_le_bytes());
        let mut data = Vec::with_capacity(self.counts.len() * 8);
        for (conn, count) in &self.counts {
            data.extend_from_slice(&conn.to_le_bytes());
            data.extend_from_slice(&count.to_le_bytes());
        }
        write_record(writer, &header, &data)
    }

    fn contains_any(&self, conns: &HashSet<u32>) -> bool {
        self.counts.iter().any(|(conn, _)| conns.contains(conn))
    }
}

/// A serialized message as stored in a chunk.
#[derive(Debug, Clone)]
pub struct RawMessage {
    pub conn: u32,
    pub time: RosTime,
    pub data: Vec<u8>,
}

/// A decoded message with its record timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub time: RosTime,
    pub value: Value,
}

fn expect_op(header: &Header, expected: u8) -> Result<(), BagError> {
    let found = header.op()?;
    if found != expected {
        return Err(BagError::UnexpectedOp { expected, found });
    }
    Ok(())
}

pub struct Bag {
    path: PathBuf,
    file: File,
    writable: bool,
    index_pos: u64,
    connections: Vec<Connection>,
    chunks: Vec<ChunkInfo>,
    pending: Vec<RawMessage>,
    finished: bool,
}

impl Bag {
    /// Open an existing bag for reading.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, BagError> {
        Self::open_with(path.as_ref(), false)
    }

    /// Open an existing bag for reading and appending.
    pub fn open_append(path: impl AsRef<Path>) -> Result<Self, BagError> {
        Self::open_with(path.as_ref(), true)
    }

    /// Create a new, empty, indexed bag. Fails if the file already exists.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, BagError> {
        let path = path.as_ref();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;

        let index_pos = (record::MAGIC.len() + record::BAG_HEADER_RECORD_LENGTH) as u64;
        file.write_all(record::MAGIC)?;
        write_bag_header(&mut file, index_pos, 0, 0)?;
        file.flush()?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
            writable: true,
            index_pos,
            connections: Vec::new(),
            chunks: Vec::new(),
            pending: Vec::new(),
            finished: false,
        })
    }

    fn open_with(path: &Path, writable: bool) -> Result<Self, BagError> {
        let file = OpenOptions::new().read(true).write(writable).open(path)?;

        let (index_pos, connections, chunks) = {
            let mut reader = BufReader::new(&file);

            let mut magic = [0u8; 13];
            match reader.read_exact(&mut magic) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    return Err(BagError::BadMagic)
                }
                Err(e) => return Err(e.into()),
            }
            if magic != record::MAGIC {
                return Err(BagError::BadMagic);
            }

            let bag_header = read_record(&mut reader)?;
            expect_op(&bag_header.header, op::BAG_HEADER)?;
            let index_pos = bag_header.header.u64("index_pos")?;
            let conn_count = bag_header.header.u32("conn_count")?;
            let chunk_count = bag_header.header.u32("chunk_count")?;
            if index_pos == 0 {
                return Err(BagError::Unindexed);
            }

            reader.seek(SeekFrom::Start(index_pos))?;
            let connections = (0..conn_count)
                .map(|_| Connection::from_record(&read_record(&mut reader)?))
                .collect::<Result<Vec<_>, _>>()?;
            let chunks = (0..chunk_count)
                .map(|_| ChunkInfo::from_record(&read_record(&mut reader)?))
                .collect::<Result<Vec<_>, _>>()?;

            (index_pos, connections, chunks)
        };

        debug!(
            "Opened bag {} ({} connections, {} chunks)",
            path.display(),
            connections.len(),
            chunks.len()
        );

        Ok(Self {
            path: path.to_path_buf(),
            file,
            writable,
            index_pos,
            connections,
            chunks,
            pending: Vec::new(),
            finished: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Distinct message types across all connections.
    pub fn message_types(&self) -> BTreeSet<String> {
        self.connections.iter().map(|c| c.msg_type.clone()).collect()
    }

    pub fn message_count(&self) -> u64 {
        self.chunks
            .iter()
            .flat_map(|c| c.counts.iter())
            .map(|(_, count)| *count as u64)
            .sum()
    }

    /// Earliest record time, taken from the chunk index.
    pub fn start_time(&self) -> Result<RosTime, BagError> {
        self.chunks
            .iter()
            .map(|c| c.start_time)
            .min()
            .ok_or(BagError::Empty)
    }

    /// Latest record time, taken from the chunk index.
    pub fn end_time(&self) -> Result<RosTime, BagError> {
        self.chunks
            .iter()
            .map(|c| c.end_time)
            .max()
            .ok_or(BagError::Empty)
    }

    /// Serialized messages on `topic`, ordered by record time.
    /// Appends that have not been finalized yet are not visible.
    pub fn read_raw(&self, topic: &str) -> Result<Vec<RawMessage>, BagError> {
        let conns: HashSet<u32> = self
            .connections
            .iter()
            .filter(|c| c.topic == topic)
            .map(|c| c.id)
            .collect();
        if conns.is_empty() {
            return Ok(Vec::new());
        }

        let mut reader = BufReader::new(&self.file);
        let mut messages = Vec::new();

        for chunk in self.chunks.iter().filter(|c| c.contains_any(&conns)) {
            reader.seek(SeekFrom::Start(chunk.chunk_pos))?;
            let chunk_record = read_record(&mut reader)?;
            expect_op(&chunk_record.header, op::CHUNK)?;

            let compression = chunk_record.header.string("compression")?;
            if compression != "none" {
                return Err(BagError::UnsupportedCompression(compression));
            }

            let body = chunk_record.data;
            let mut cursor = Cursor::new(body.as_slice());
            while (cursor.position() as usize) < body.len() {
                let inner = read_record(&mut cursor)?;
                if inner.header.op()? != op::MSG_DATA {
                    continue;
                }
                let conn = inner.header.u32("conn")?;
                if conns.contains(&conn) {
                    messages.push(RawMessage {
                        conn,
                        time: inner.header.time("time")?,
                        data: inner.data,
                    });
                }
            }
        }

        messages.sort_by_key(|m| m.time);
        Ok(messages)
    }

    /// Decoded messages on `topic`, ordered by record time.
    pub fn read_messages(&self, topic: &str) -> Result<Vec<Message>, BagError> {
        let mut schemas: HashMap<u32, Schema> = HashMap::new();
        let mut messages = Vec::new();

        for raw in self.read_raw(topic)? {
            if !schemas.contains_key(&raw.conn) {
                let conn = self
                    .connections
                    .iter()
                    .find(|c| c.id == raw.conn)
                    .ok_or_else(|| {
                        BagError::InvalidRecord(format!("message references unknown connection {}", raw.conn))
                    })?;
                schemas.insert(raw.conn, Schema::parse(&conn.msg_type, &conn.definition)?);
            }
            let value = schemas[&raw.conn].decode(&raw.data)?;
            messages.push(Message {
                time: raw.time,
                value,
            });
        }

        Ok(messages)
    }

    /// Queue a serialized message for writing. A connection for
    /// (`topic`, `msg_type`) is reused when one exists.
    pub fn append(
        &mut self,
        topic: &str,
        msg_type: &MessageType<'_>,
        time: RosTime,
        data: Vec<u8>,
    ) -> Result<(), BagError> {
        if !self.writable {
            return Err(BagError::ReadOnly);
        }

        let existing = self
            .connections
            .iter()
            .find(|c| c.topic == topic && c.msg_type == msg_type.name)
            .map(|c| c.id);
        let conn = match existing {
            Some(id) => id,
            None => {
                let id = self.connections.iter().map(|c| c.id + 1).max().unwrap_or(0);
                self.connections.push(Connection::new(id, topic, msg_type));
                id
            }
        };

        self.pending.push(RawMessage { conn, time, data });
        Ok(())
    }

    /// Flush pending appends and rewrite the index.
    pub fn close(mut self) -> Result<(), BagError> {
        self.finalize()
    }

    fn finalize(&mut self) -> Result<(), BagError> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        if !self.writable || self.pending.is_empty() {
            return Ok(());
        }

        let pending = std::mem::take(&mut self.pending);
        let mut body = Vec::new();
        let mut index: BTreeMap<u32, Vec<(RosTime, u32)>> = BTreeMap::new();

        for msg in &pending {
            if !index.contains_key(&msg.conn) {
                if let Some(conn) = self.connections.iter().find(|c| c.id == msg.conn) {
                    conn.write(&mut body)?;
                }
            }
            let offset = body.len() as u32;
            let header = Header::new()
                .with("op", [op::MSG_DATA])
                .with("conn", msg.conn.to_le_bytes())
                .with("time", msg.time.to_bytes());
            write_record(&mut body, &header, &msg.data)?;
            index.entry(msg.conn).or_default().push((msg.time, offset));
        }

        let start_time = pending.iter().map(|m| m.time).min().unwrap_or_default();
        let end_time = pending.iter().map(|m| m.time).max().unwrap_or_default();

        self.file.set_len(self.index_pos)?;
        let mut writer = BufWriter::new(&self.file);
        writer.seek(SeekFrom::Start(self.index_pos))?;

        let chunk_pos = self.index_pos;
        let chunk_header = Header::new()
            .with("op", [op::CHUNK])
            .with("compression", "none")
            .with("size", (body.len() as u32).to_le_bytes());
        let mut pos = chunk_pos + write_record(&mut writer, &chunk_header, &body)?;

        for (conn, entries) in &index {
            let header = Header::new()
                .with("op", [op::INDEX_DATA])
                .with("ver", 1u32.to_le_bytes())
                .with("conn", conn.to_le_bytes())
                .with("count", (entries.len() as u32).to_le_bytes());
            let mut data = Vec::with_capacity(entries.len() * 12);
            for (time, offset) in entries {
                data.extend_from_slice(&time.to_bytes());
                data.extend_from_slice(&offset.to_le_bytes());
            }
            pos += write_record(&mut writer, &header, &data)?;
        }

        self.chunks.push(ChunkInfo {
            chunk_pos,
            start_time,
            end_time,
            counts: index
                .iter()
                .map(|(conn, entries)| (*conn, entries.len() as u32))
                .collect(),
        });

        let index_pos = pos;
        for conn in &self.connections {
            conn.write(&mut writer)?;
        }
        for chunk in &self.chunks {
            chunk.write(&mut writer)?;
        }

        writer.seek(SeekFrom::Start(record::MAGIC.len() as u64))?;
        write_bag_header(
            &mut writer,
            index_pos,
            self.connections.len() as u32,
            self.chunks.len() as u32,
        )?;
        writer.flush()?;
        drop(writer);
        self.file.sync_all()?;

        self.index_pos = index_pos;
        debug!(
            "Wrote {} message(s) to {}",
            pending.len(),
            self.path.display()
        );
        Ok(())
    }
}

impl Drop for Bag {
    fn drop(&mut self) {
        if let Err(e) = self.finalize() {
            error!("Error finalizing bag {}: {}", self.path.display(), e);
        }
    }
}
