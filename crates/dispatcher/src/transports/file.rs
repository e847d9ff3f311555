//! FileTransport - appends deliveries to an NDJSON file
//!
//! One line per outbound record:
//! `{"route": .., "route-type": .., "media-type": .., "payload": <base64|null>, "metadata": ..}`

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use contracts::{
    DestinationTransport, OutboundMetadata, OutboundRecord, OutboundRoute, TransportError,
};
use serde::Serialize;
use tracing::{debug, error, instrument};

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct Envelope<'a> {
    route: String,
    route_type: String,
    media_type: &'static str,
    payload: Option<String>,
    metadata: &'a OutboundMetadata,
}

impl<'a> Envelope<'a> {
    fn new(route: &OutboundRoute, record: &'a OutboundRecord) -> Self {
        Self {
            route: route.name().to_string(),
            route_type: route.route_type.to_string(),
            media_type: record.media_type().as_str(),
            payload: record.payload_bytes().map(|p| STANDARD.encode(p)),
            metadata: record.metadata(),
        }
    }
}

/// Transport that writes every delivery to disk
pub struct FileTransport {
    name: String,
    path: PathBuf,
    writer: BufWriter<File>,
}

impl FileTransport {
    /// Create (or truncate) the output file
    pub fn create(name: impl Into<String>, path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)?;

        Ok(Self {
            name: name.into(),
            path,
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_delivery(
        &mut self,
        route: &OutboundRoute,
        records: &[OutboundRecord],
    ) -> std::io::Result<()> {
        for record in records {
            serde_json::to_writer(&mut self.writer, &Envelope::new(route, record))
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
            self.writer.write_all(b"\n")?;
        }
        Ok(())
    }
}

impl DestinationTransport for FileTransport {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "file_transport_send",
        skip(self, route, records),
        fields(transport = %self.name, route = %route, records = records.len())
    )]
    async fn send(
        &mut self,
        route: &OutboundRoute,
        records: &[OutboundRecord],
    ) -> Result<(), TransportError> {
        self.write_delivery(route, records).map_err(|e| {
            error!(transport = %self.name, error = %e, "Write failed");
            TransportError::from(e)
        })
    }

    #[instrument(name = "file_transport_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), TransportError> {
        self.writer.flush()?;
        Ok(())
    }

    #[instrument(name = "file_transport_close", skip(self))]
    async fn close(&mut self) -> Result<(), TransportError> {
        self.writer.flush()?;
        debug!(transport = %self.name, path = %self.path.display(), "FileTransport closed");
        Ok(())
    }
}
