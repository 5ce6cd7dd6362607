//! The four wire messages of the lock protocol, each tagged with the mutex
//! name so several independently named mutexes can share one transport
//! (spec §6). Modeled after the discovery protocol's `Ping`/`Pong`/
//! `FindNode`/`Neighbors` messages: one `Serializer` impl per payload, plus
//! an enclosing enum dispatched on a one-byte type tag.

use meshlock_common::error::{ReaderError, ReaderResult};
use meshlock_common::serializer::{Reader, Serializer, Writer};

use super::identity::Identity;

const TYPE_REQUEST: u8 = 0x01;
const TYPE_GRANT: u8 = 0x02;
const TYPE_DENY: u8 = 0x03;
const TYPE_RELEASE: u8 = 0x04;

fn write_identity(writer: &mut Writer, id: Identity) {
    writer.write_u32(id.ip());
    writer.write_u16(id.port());
}

fn read_identity(reader: &mut Reader) -> ReaderResult<Identity> {
    let ip = reader.read_u32()?;
    let port = reader.read_u16()?;
    Ok(Identity::new(ip, port))
}

/// A `Request` or `Release`: carries only the sender's identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SenderPayload {
    pub sender: Identity,
}

impl Serializer for SenderPayload {
    fn read(reader: &mut Reader) -> ReaderResult<Self> {
        Ok(Self {
            sender: read_identity(reader)?,
        })
    }

    fn write(&self, writer: &mut Writer) {
        write_identity(writer, self.sender);
    }
}

/// A `Grant` or `Deny`: carries the identity of the requester it answers,
/// so a response to a cancelled request can be told apart from a live one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetPayload {
    pub target: Identity,
}

impl Serializer for TargetPayload {
    fn read(reader: &mut Reader) -> ReaderResult<Self> {
        Ok(Self {
            target: read_identity(reader)?,
        })
    }

    fn write(&self, writer: &mut Writer) {
        write_identity(writer, self.target);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutexMessage {
    Request(SenderPayload),
    Grant(TargetPayload),
    Deny(TargetPayload),
    Release(SenderPayload),
}

impl MutexMessage {
    pub fn request(sender: Identity) -> Self {
        Self::Request(SenderPayload { sender })
    }

    pub fn release(sender: Identity) -> Self {
        Self::Release(SenderPayload { sender })
    }

    pub fn grant(target: Identity) -> Self {
        Self::Grant(TargetPayload { target })
    }

    pub fn deny(target: Identity) -> Self {
        Self::Deny(TargetPayload { target })
    }

    fn message_type(&self) -> u8 {
        match self {
            Self::Request(_) => TYPE_REQUEST,
            Self::Grant(_) => TYPE_GRANT,
            Self::Deny(_) => TYPE_DENY,
            Self::Release(_) => TYPE_RELEASE,
        }
    }
}

impl Serializer for MutexMessage {
    fn read(reader: &mut Reader) -> ReaderResult<Self> {
        let message_type = reader.read_u8()?;
        match message_type {
            TYPE_REQUEST => Ok(Self::Request(SenderPayload::read(reader)?)),
            TYPE_GRANT => Ok(Self::Grant(TargetPayload::read(reader)?)),
            TYPE_DENY => Ok(Self::Deny(TargetPayload::read(reader)?)),
            TYPE_RELEASE => Ok(Self::Release(SenderPayload::read(reader)?)),
            _ => Err(ReaderError::InvalidValue),
        }
    }

    fn write(&self, writer: &mut Writer) {
        writer.write_u8(self.message_type());
        match self {
            Self::Request(p) | Self::Release(p) => p.write(writer),
            Self::Grant(p) | Self::Deny(p) => p.write(writer),
        }
    }
}

/// A `MutexMessage` plus the name of the mutex it belongs to, so a shared
/// transport can route messages for several named locks and discard
/// anything naming a mutex it doesn't know (spec §6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedMessage {
    pub mutex_name: String,
    pub message: MutexMessage,
}

impl Serializer for NamedMessage {
    fn read(reader: &mut Reader) -> ReaderResult<Self> {
        let len = reader.read_u8()? as usize;
        let name_bytes = reader.read_bytes(len)?;
        let mutex_name =
            String::from_utf8(name_bytes).map_err(|_| ReaderError::InvalidValue)?;
        let message = MutexMessage::read(reader)?;
        Ok(Self {
            mutex_name,
            message,
        })
    }

    fn write(&self, writer: &mut Writer) {
        let name_bytes = self.mutex_name.as_bytes();
        writer.write_u8(name_bytes.len() as u8);
        writer.write_bytes(name_bytes);
        self.message.write(writer);
    }
}
