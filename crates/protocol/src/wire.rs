//! Wire-Format der TCP-Verbindung
//!
//! Frame-basiertes Protokoll: Laenge (u32 big-endian) + JSON-Payload.
//! Die Laenge zaehlt nur die Payload-Bytes, nicht das Laengenfeld selbst.
//! Frames ueber dem Limit sind ein Protokollfehler und beenden die
//! Verbindung (Standard-Limit: 256 KiB, Chat-Events sind klein).

use bytes::{Buf, BufMut, BytesMut};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::{Decoder, Encoder};

use crate::events::HubMessage;

/// Standard-maximale Frame-Groesse (256 KiB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 256 * 1024;

/// Groesse des Laengen-Felds in Bytes
pub const LENGTH_FIELD_SIZE: usize = 4;

/// tokio-util Codec fuer die frame-basierte Hub-Verbindung
///
/// Implementiert `Encoder<HubMessage>` und `Decoder` fuer die Verwendung
/// mit `tokio_util::codec::Framed`.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    /// Maximale erlaubte Frame-Groesse in Bytes
    max_frame_size: usize,
}

impl FrameCodec {
    /// Erstellt einen neuen `FrameCodec` mit Standard-Limit
    pub fn new() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    /// Erstellt einen `FrameCodec` mit eigenem Limit
    pub fn with_max_size(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    /// Gibt das konfigurierte Limit zurueck
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

/// Prueft eine Frame-Laenge gegen das Limit
fn laenge_pruefen(laenge: usize, limit: usize) -> io::Result<()> {
    if laenge > limit {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Frame zu gross: {} Bytes (Limit: {} Bytes)", laenge, limit),
        ));
    }
    Ok(())
}

fn json_fehler(e: serde_json::Error) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidData,
        format!("JSON-Verarbeitung fehlgeschlagen: {}", e),
    )
}

impl Decoder for FrameCodec {
    type Item = HubMessage;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < LENGTH_FIELD_SIZE {
            return Ok(None);
        }

        // Laengenfeld ansehen ohne es zu verbrauchen
        let laenge = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;
        laenge_pruefen(laenge, self.max_frame_size)?;

        let gesamt = LENGTH_FIELD_SIZE + laenge;
        if src.len() < gesamt {
            // Platz fuer den Rest des Frames vorbelegen
            src.reserve(gesamt - src.len());
            return Ok(None);
        }

        src.advance(LENGTH_FIELD_SIZE);
        let payload = src.split_to(laenge);
        let nachricht = serde_json::from_slice(&payload).map_err(json_fehler)?;
        Ok(Some(nachricht))
    }
}

impl Encoder<HubMessage> for FrameCodec {
    type Error = io::Error;

    fn encode(&mut self, item: HubMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let json = serde_json::to_vec(&item).map_err(json_fehler)?;
        laenge_pruefen(json.len(), self.max_frame_size)?;

        dst.reserve(LENGTH_FIELD_SIZE + json.len());
        dst.put_u32(json.len() as u32);
        dst.put_slice(&json);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Hilfsfunktionen fuer direktes async Lesen/Schreiben
// ---------------------------------------------------------------------------

/// Liest einen einzelnen Frame aus einem `AsyncRead`
///
/// Praktisch fuer Clients und Tests die keine `Framed`-Huelle aufbauen
/// wollen. `UnexpectedEof` wenn die Verbindung mitten im Frame abreisst.
pub async fn read_frame<R>(reader: &mut R, max_frame_size: usize) -> io::Result<HubMessage>
where
    R: AsyncRead + Unpin,
{
    let mut laengenfeld = [0u8; LENGTH_FIELD_SIZE];
    reader.read_exact(&mut laengenfeld).await?;
    let laenge = u32::from_be_bytes(laengenfeld) as usize;
    laenge_pruefen(laenge, max_frame_size)?;

    let mut payload = vec![0u8; laenge];
    reader.read_exact(&mut payload).await?;
    serde_json::from_slice(&payload).map_err(json_fehler)
}

/// Schreibt einen einzelnen Frame in einen `AsyncWrite`
pub async fn write_frame<W>(
    writer: &mut W,
    message: &HubMessage,
    max_frame_size: usize,
) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let json = serde_json::to_vec(message).map_err(json_fehler)?;
    laenge_pruefen(json.len(), max_frame_size)?;

    writer.write_all(&(json.len() as u32).to_be_bytes()).await?;
    writer.write_all(&json).await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
