//! Binary encoding and decoding of [`Envelope`]s.
//!
//! The codec is a pair of pure functions: no state, no I/O. Integers are
//! big-endian ("network byte order"). Variable-length fields are always
//! preceded by an explicit length prefix (one or two bytes depending on the
//! kind), never null-terminated and never inferred from "whatever is left
//! in the buffer".
//!
//! `bytes::BufMut` does the writing. Reading goes through a small
//! [`Reader`] that checks every length prefix against the buffer before
//! slicing, so a hostile datagram can't make us read out of bounds.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::{
    DecodeError, EncodeError, Envelope, Kind, Message, PeerId, PeerStatus,
    RoomId, SessionId, StatusCode,
};

/// Size of the `{version, kind}` header shared by every message.
pub const HEADER_LEN: usize = 2;

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Encodes an envelope into exactly the bytes its layout declares.
///
/// The buffer is sized from the actual field contents, so there is no
/// padding and no upper bound other than the length prefixes themselves.
///
/// # Errors
/// Returns [`EncodeError::FieldTooLong`] if a name, password, reason, chat
/// text, or changed-lines list doesn't fit its length prefix.
///
/// # Example
///
/// ```rust
/// use ntetris_protocol::{encode, Envelope, Message};
///
/// let env = Envelope::new(Message::RegisterClient { name: "Bob".into() });
/// let bytes = encode(&env).unwrap();
/// assert_eq!(&bytes[..], &[0x01, 0x01, 0x03, b'B', b'o', b'b']);
/// ```
pub fn encode(envelope: &Envelope) -> Result<Bytes, EncodeError> {
    let message = &envelope.message;
    let kind = message.kind();

    let mut buf = BytesMut::with_capacity(
        HEADER_LEN + kind.min_body_len() + variable_len(message),
    );
    buf.put_u8(envelope.version);
    buf.put_u8(kind as u8);

    match message {
        Message::RegisterTetrad { shape } => buf.put_u8(*shape),

        Message::RegisterClient { name } => {
            buf.put_u8(prefix_u8(kind, "name", name.len())?);
            buf.put_slice(name.as_bytes());
        }

        Message::UpdateTetrad { x, y, x0, y0, rot } => {
            buf.put_i32(*x);
            buf.put_i32(*y);
            buf.put_i32(*x0);
            buf.put_i32(*y0);
            buf.put_i32(*rot);
        }

        Message::UpdateClientState {
            lines,
            score,
            level,
            status,
            changed_lines,
        } => {
            buf.put_i32(*lines);
            buf.put_i32(*score);
            buf.put_i32(*level);
            buf.put_u8(*status);
            buf.put_u8(prefix_u8(kind, "changed_lines", changed_lines.len())?);
            for line in changed_lines {
                buf.put_u16(*line);
            }
        }

        Message::DisconnectClient { session_id }
        | Message::ListRooms { session_id }
        | Message::RegistrationAck { session_id }
        | Message::Ping { session_id } => buf.put_u32(session_id.0),

        Message::KickClient { status, reason } => {
            buf.put_u8(*status);
            buf.put_u16(prefix_u16(kind, "reason", reason.len())?);
            buf.put_slice(reason.as_bytes());
        }

        Message::CreateRoom {
            session_id,
            max_players,
            name,
            password,
        } => {
            buf.put_u32(session_id.0);
            buf.put_u8(*max_players);
            buf.put_u8(prefix_u8(kind, "name", name.len())?);
            buf.put_u8(prefix_u8(kind, "password", password.len())?);
            buf.put_slice(name.as_bytes());
            buf.put_slice(password.as_bytes());
        }

        Message::RoomAnnounce {
            room_id,
            max_players,
            joined_players,
            password_protected,
            name,
        } => {
            buf.put_u32(room_id.0);
            buf.put_u8(*max_players);
            buf.put_u8(*joined_players);
            buf.put_u8(u8::from(*password_protected));
            buf.put_u8(prefix_u8(kind, "name", name.len())?);
            buf.put_slice(name.as_bytes());
        }

        Message::JoinRoom {
            session_id,
            room_id,
            password,
        } => {
            buf.put_u32(session_id.0);
            buf.put_u32(room_id.0);
            buf.put_u8(prefix_u8(kind, "password", password.len())?);
            buf.put_slice(password.as_bytes());
        }

        Message::Status { code } => buf.put_u8(code.as_u8()),

        Message::PeerAnnounce {
            peer_id,
            status,
            name,
        } => {
            buf.put_u32(peer_id.0);
            buf.put_u8(prefix_u8(kind, "name", name.len())?);
            buf.put_u8(status.as_u8());
            buf.put_slice(name.as_bytes());
        }

        Message::Chat { peer_id, text } => {
            buf.put_u32(peer_id.0);
            buf.put_u16(prefix_u16(kind, "text", text.len())?);
            buf.put_slice(text.as_bytes());
        }
    }

    Ok(buf.freeze())
}

/// Bytes contributed by the variable-length fields of a message.
fn variable_len(message: &Message) -> usize {
    match message {
        Message::RegisterClient { name }
        | Message::RoomAnnounce { name, .. }
        | Message::PeerAnnounce { name, .. } => name.len(),
        Message::UpdateClientState { changed_lines, .. } => {
            changed_lines.len() * 2
        }
        Message::KickClient { reason, .. } => reason.len(),
        Message::CreateRoom { name, password, .. } => {
            name.len() + password.len()
        }
        Message::JoinRoom { password, .. } => password.len(),
        Message::Chat { text, .. } => text.len(),
        _ => 0,
    }
}

fn prefix_u8(
    kind: Kind,
    field: &'static str,
    len: usize,
) -> Result<u8, EncodeError> {
    u8::try_from(len).map_err(|_| EncodeError::FieldTooLong {
        kind,
        field,
        len,
        max: u8::MAX as usize,
    })
}

fn prefix_u16(
    kind: Kind,
    field: &'static str,
    len: usize,
) -> Result<u16, EncodeError> {
    u16::try_from(len).map_err(|_| EncodeError::FieldTooLong {
        kind,
        field,
        len,
        max: u16::MAX as usize,
    })
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decodes one datagram into an [`Envelope`].
///
/// The whole buffer must be exactly one message: short buffers are
/// [`DecodeError::Truncated`], length prefixes that run past the end or
/// leftover trailing bytes are [`DecodeError::LengthMismatch`], and tags
/// outside the defined set are [`DecodeError::UnknownKind`].
///
/// The version byte is returned as-is; deciding what to do with a foreign
/// version is the caller's business.
pub fn decode(data: &[u8]) -> Result<Envelope, DecodeError> {
    if data.len() < HEADER_LEN {
        return Err(DecodeError::Truncated {
            needed: HEADER_LEN,
            actual: data.len(),
        });
    }

    let version = data[0];
    let kind = Kind::try_from(data[1]).map_err(DecodeError::UnknownKind)?;

    let needed = HEADER_LEN + kind.min_body_len();
    if data.len() < needed {
        return Err(DecodeError::Truncated {
            needed,
            actual: data.len(),
        });
    }

    // From here on the fixed part of the body is known to be present, so
    // the `Buf::get_*` calls below can't run short. Only the variable
    // parts go through `Reader::take`.
    let mut r = Reader {
        buf: &data[HEADER_LEN..],
        total: data.len(),
    };

    let message = match kind {
        Kind::RegisterTetrad => Message::RegisterTetrad {
            shape: r.buf.get_u8(),
        },

        Kind::RegisterClient => {
            let len = usize::from(r.buf.get_u8());
            Message::RegisterClient { name: r.text(len)? }
        }

        Kind::UpdateTetrad => Message::UpdateTetrad {
            x: r.buf.get_i32(),
            y: r.buf.get_i32(),
            x0: r.buf.get_i32(),
            y0: r.buf.get_i32(),
            rot: r.buf.get_i32(),
        },

        Kind::UpdateClientState => {
            let lines = r.buf.get_i32();
            let score = r.buf.get_i32();
            let level = r.buf.get_i32();
            let status = r.buf.get_u8();
            let count = usize::from(r.buf.get_u8());
            let mut raw = r.take(count * 2)?;
            let changed_lines = (0..count).map(|_| raw.get_u16()).collect();
            Message::UpdateClientState {
                lines,
                score,
                level,
                status,
                changed_lines,
            }
        }

        Kind::DisconnectClient => Message::DisconnectClient {
            session_id: SessionId(r.buf.get_u32()),
        },

        Kind::KickClient => {
            let status = r.buf.get_u8();
            let len = usize::from(r.buf.get_u16());
            Message::KickClient {
                status,
                reason: r.text(len)?,
            }
        }

        Kind::CreateRoom => {
            let session_id = SessionId(r.buf.get_u32());
            let max_players = r.buf.get_u8();
            let name_len = usize::from(r.buf.get_u8());
            let pass_len = usize::from(r.buf.get_u8());
            let (name, password) = r.take(name_len + pass_len)?.split_at(name_len);
            Message::CreateRoom {
                session_id,
                max_players,
                name: lossy(name),
                password: lossy(password),
            }
        }

        Kind::ListRooms => Message::ListRooms {
            session_id: SessionId(r.buf.get_u32()),
        },

        Kind::RoomAnnounce => {
            let room_id = RoomId(r.buf.get_u32());
            let max_players = r.buf.get_u8();
            let joined_players = r.buf.get_u8();
            let password_protected = r.buf.get_u8() != 0;
            let len = usize::from(r.buf.get_u8());
            Message::RoomAnnounce {
                room_id,
                max_players,
                joined_players,
                password_protected,
                name: r.text(len)?,
            }
        }

        Kind::JoinRoom => {
            let session_id = SessionId(r.buf.get_u32());
            let room_id = RoomId(r.buf.get_u32());
            let len = usize::from(r.buf.get_u8());
            Message::JoinRoom {
                session_id,
                room_id,
                password: r.text(len)?,
            }
        }

        Kind::Status => Message::Status {
            code: StatusCode::from(r.buf.get_u8()),
        },

        Kind::RegistrationAck => Message::RegistrationAck {
            session_id: SessionId(r.buf.get_u32()),
        },

        Kind::Ping => Message::Ping {
            session_id: SessionId(r.buf.get_u32()),
        },

        Kind::PeerAnnounce => {
            let peer_id = PeerId(r.buf.get_u32());
            let len = usize::from(r.buf.get_u8());
            let status = PeerStatus::from(r.buf.get_u8());
            Message::PeerAnnounce {
                peer_id,
                status,
                name: r.text(len)?,
            }
        }

        Kind::Chat => {
            let peer_id = PeerId(r.buf.get_u32());
            let len = usize::from(r.buf.get_u16());
            Message::Chat {
                peer_id,
                text: r.text(len)?,
            }
        }
    };

    r.finish()?;
    Ok(Envelope { version, message })
}

/// Bounds-checked cursor over the body of a datagram.
struct Reader<'a> {
    buf: &'a [u8],
    /// Length of the whole datagram, header included. Used for error
    /// reporting only.
    total: usize,
}

impl<'a> Reader<'a> {
    fn consumed(&self) -> usize {
        self.total - self.buf.len()
    }

    /// Splits off `len` bytes named by a length prefix.
    fn take(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        if self.buf.len() < len {
            return Err(DecodeError::LengthMismatch {
                expected: self.consumed() + len,
                actual: self.total,
            });
        }
        let (head, tail) = self.buf.split_at(len);
        self.buf = tail;
        Ok(head)
    }

    fn text(&mut self, len: usize) -> Result<String, DecodeError> {
        self.take(len).map(lossy)
    }

    /// Rejects trailing bytes beyond the declared layout.
    fn finish(self) -> Result<(), DecodeError> {
        if self.buf.is_empty() {
            Ok(())
        } else {
            Err(DecodeError::LengthMismatch {
                expected: self.consumed(),
                actual: self.total,
            })
        }
    }
}

fn lossy(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

// =========================================================================
// Tests
// =========================================================================
