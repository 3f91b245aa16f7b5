use std::sync::Arc;
use std::time::Duration;

use polywire_frame::{Framing, HeaderKind, Pauser, HEADER_SIZE};
use polywire_store::ByteStore;
use smallvec::SmallVec;

use crate::error::Result;
use crate::format::WireFormat;
use crate::marshal::{default_registry, MarshalRegistry};
use crate::text::TextState;
use crate::value::{Field, Value};

/// Wire-level configuration.
#[derive(Debug, Clone)]
pub struct WireConfig {
    /// Wait budget for the framing suspension points.
    pub timeout: Duration,
    /// Verify the commit CAS and the zeroed tail on every commit.
    pub assertions: bool,
}

impl Default for WireConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            assertions: cfg!(debug_assertions),
        }
    }
}

// The three closed format variants. Text carries per-document renderer
// state; the binary and raw codecs are stateless between calls.
pub(crate) enum FormatState {
    Text(TextState),
    Binary,
    Raw,
}

/// A document stream view over a shared byte store, in one of the three
/// wire formats.
///
/// A `Wire` combines the framing layer (reservation, commit, read, scan)
/// with the format codec driving field and value I/O inside a document
/// body. One `Wire` instance serves one thread at a time; create more
/// instances over the same store for concurrent writers and readers.
pub struct Wire<S: ByteStore> {
    pub(crate) framing: Framing<S>,
    pub(crate) format: FormatState,
    pub(crate) registry: Arc<MarshalRegistry>,
    pub(crate) timeout: Duration,
    /// Start of the current document body, for body-relative bound offsets.
    pub(crate) body_start: u64,
    /// Fields seen ahead of the linear cursor: a text document parsed up
    /// front, or binary fields skipped during an out-of-order lookup.
    pub(crate) pending: SmallVec<[(Field, Value); 4]>,
    pub(crate) text_parsed: bool,
}

impl<S: ByteStore> Wire<S> {
    pub fn new(store: Arc<S>, format: WireFormat) -> Self {
        let format = match format {
            WireFormat::Text => FormatState::Text(TextState::new(0)),
            WireFormat::Binary => FormatState::Binary,
            WireFormat::Raw => FormatState::Raw,
        };
        Self {
            framing: Framing::new(store),
            format,
            registry: Arc::clone(default_registry()),
            timeout: WireConfig::default().timeout,
            body_start: 0,
            pending: SmallVec::new(),
            text_parsed: false,
        }
    }

    pub fn text(store: Arc<S>) -> Self {
        Self::new(store, WireFormat::Text)
    }

    pub fn binary(store: Arc<S>) -> Self {
        Self::new(store, WireFormat::Binary)
    }

    pub fn raw(store: Arc<S>) -> Self {
        Self::new(store, WireFormat::Raw)
    }

    /// Use an explicit marshalling registry instead of the process default.
    pub fn with_registry(mut self, registry: Arc<MarshalRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_config(mut self, config: WireConfig) -> Self {
        self.timeout = config.timeout;
        self.framing.set_assertions(config.assertions);
        self
    }

    pub fn wire_format(&self) -> WireFormat {
        match self.format {
            FormatState::Text(_) => WireFormat::Text,
            FormatState::Binary => WireFormat::Binary,
            FormatState::Raw => WireFormat::Raw,
        }
    }

    pub fn registry(&self) -> &Arc<MarshalRegistry> {
        &self.registry
    }

    /// The framing layer, for header-level control.
    pub fn framing(&self) -> &Framing<S> {
        &self.framing
    }

    pub fn framing_mut(&mut self) -> &mut Framing<S> {
        &mut self.framing
    }

    pub fn set_pauser(&mut self, pauser: Box<dyn Pauser>) {
        self.framing.set_pauser(pauser);
    }

    pub fn header_number(&self) -> Option<i64> {
        self.framing.header_number()
    }

    pub fn set_header_number(&mut self, header_number: Option<i64>) {
        self.framing.set_header_number(header_number);
    }

    /// Reset cursors and per-document state; unset the header counter.
    pub fn clear(&mut self) {
        self.framing.clear();
        self.reset_body(0);
    }

    /// Acquire this wire for the current thread. Pair with [`end_use`].
    ///
    /// [`end_use`]: Wire::end_use
    pub fn start_use(&mut self) -> Result<()> {
        Ok(self.framing.start_use()?)
    }

    pub fn end_use(&mut self) -> Result<()> {
        Ok(self.framing.end_use()?)
    }

    pub(crate) fn reset_body(&mut self, body_start: u64) {
        self.body_start = body_start;
        self.pending.clear();
        self.text_parsed = false;
        if let FormatState::Text(_) = self.format {
            self.format = FormatState::Text(TextState::new(body_start));
        }
    }

    pub(crate) fn store_arc(&self) -> Arc<S> {
        Arc::clone(self.framing.buf().store())
    }

    /// Append one data or meta-data document, built by `f`.
    ///
    /// On success the document is committed and `f`'s result returned. If
    /// `f` fails the reservation is left pending (the header is never
    /// half-committed) and the caller may still commit partial content
    /// through [`framing_mut`] or abandon the wire with [`clear`].
    ///
    /// [`framing_mut`]: Wire::framing_mut
    /// [`clear`]: Wire::clear
    pub fn write_document<R>(
        &mut self,
        meta: bool,
        f: impl FnOnce(&mut Self) -> Result<R>,
    ) -> Result<R> {
        let position = self.framing.write_header(None, self.timeout, None)?;
        self.reset_body(position + HEADER_SIZE);
        let result = f(self)?;
        self.framing.update_header(None, position, meta)?;
        Ok(result)
    }

    /// Append a document against a concrete reservation of `len` bytes.
    pub fn write_sized_document<R>(
        &mut self,
        len: u32,
        meta: bool,
        f: impl FnOnce(&mut Self) -> Result<R>,
    ) -> Result<R> {
        let position = self.framing.write_header(Some(len), self.timeout, None)?;
        self.reset_body(position + HEADER_SIZE);
        let result = f(self)?;
        self.framing.update_header(Some(len), position, meta)?;
        Ok(result)
    }

    /// Initialise the stream's first (meta-data) document. Returns false
    /// when another wire won the race, in which case `f` never runs.
    pub fn write_first_document(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<()>,
    ) -> Result<bool> {
        if !self.framing.write_first_header()? {
            return Ok(false);
        }
        self.reset_body(HEADER_SIZE);
        f(self)?;
        self.framing.update_first_header()?;
        Ok(true)
    }

    /// Wait for the stream's first document and read it with `f`. Leaves
    /// the cursor on the second document.
    pub fn read_first_document<R>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<R>,
    ) -> Result<R> {
        self.framing.read_first_header(self.timeout)?;
        let body_start = self.framing.buf().read_position();
        self.reset_body(body_start);
        let result = f(self);
        let end = self.framing.buf().read_limit();
        let capacity = self.framing.buf().real_capacity();
        self.framing.buf_mut().set_read_position(end);
        self.framing.buf_mut().set_read_limit(capacity);
        result
    }

    /// Read the next data document, skipping meta-data. Returns `Ok(None)`
    /// when no further document is ready, and `FrameError::EndOfStream`
    /// once the terminator is reached.
    pub fn read_document<R>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<R>,
    ) -> Result<Option<R>> {
        match self.framing.read_data_header(false)? {
            HeaderKind::None => Ok(None),
            _ => self.read_bounded(f).map(Some),
        }
    }

    /// Read the next document of either kind; `f` receives the kind.
    pub fn read_any_document<R>(
        &mut self,
        f: impl FnOnce(&mut Self, HeaderKind) -> Result<R>,
    ) -> Result<Option<R>> {
        match self.framing.read_data_header(true)? {
            HeaderKind::None => Ok(None),
            kind => self.read_bounded(|wire| f(wire, kind)).map(Some),
        }
    }

    fn read_bounded<R>(&mut self, f: impl FnOnce(&mut Self) -> Result<R>) -> Result<R> {
        let position = self.framing.buf().read_position();
        self.framing.read_and_set_length(position)?;
        self.reset_body(position + HEADER_SIZE);
        let result = f(self);
        // step past the document whether or not `f` consumed it all
        let header = self.framing.buf().volatile_u32(position)?;
        let next = position + HEADER_SIZE + polywire_frame::length_of(header) as u64;
        let capacity = self.framing.buf().real_capacity();
        self.framing.buf_mut().set_read_position(next);
        self.framing.buf_mut().set_read_limit(capacity);
        result
    }

    /// Terminate the stream. Idempotent.
    pub fn write_end_of_wire(&mut self) -> Result<()> {
        Ok(self.framing.write_end_of_wire(self.timeout)?)
    }
}
