use std::sync::Arc;
use std::time::Duration;

use polywire_store::{ByteStore, StoreBuf};

use crate::error::{FrameError, Result};
use crate::header::{
    align_length, is_data, is_not_complete, is_ready, is_ready_meta_data, length_of, HeaderKind,
    END_OF_DATA, HEADER_SIZE, MAX_FIRST_HEADER_LENGTH, MAX_LENGTH, META_DATA, NOT_COMPLETE,
    NOT_COMPLETE_UNKNOWN_LENGTH, NOT_INITIALIZED,
};
use crate::pauser::{BusyPauser, LongPauser, Pauser};
use crate::scope::UseScope;

/// Writers that observe another writer more than this far ahead jump their
/// cursor instead of scanning one document at a time.
const SKIP_AHEAD_THRESHOLD: u64 = 1 << 20;

/// Shared framing state for a wire: buffer cursors, the pauser, the header
/// counter, and the pending-reservation flag.
///
/// One `Framing` belongs to one writer or reader at a time (see
/// [`UseScope`]); several instances over the same store contend through the
/// header words. Reservations round their length up to a 32-bit boundary so
/// every header word lands naturally aligned; the spare tail bytes of a
/// document stay zero and every format treats them as padding.
pub struct Framing<S> {
    buf: StoreBuf<S>,
    pauser: Box<dyn Pauser>,
    pauser_is_default: bool,
    scope: UseScope,
    header_number: Option<i64>,
    inside_header: bool,
    assertions: bool,
}

impl<S: ByteStore> Framing<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            buf: StoreBuf::new(store),
            pauser: Box::new(BusyPauser::default()),
            pauser_is_default: true,
            scope: UseScope::new(),
            header_number: None,
            inside_header: false,
            assertions: cfg!(debug_assertions),
        }
    }

    pub fn buf(&self) -> &StoreBuf<S> {
        &self.buf
    }

    pub fn buf_mut(&mut self) -> &mut StoreBuf<S> {
        &mut self.buf
    }

    /// The advisory data-document counter. `None` means unset.
    pub fn header_number(&self) -> Option<i64> {
        self.header_number
    }

    /// Set or unset the header counter, e.g. to resynchronise on recovery.
    pub fn set_header_number(&mut self, header_number: Option<i64>) {
        self.header_number = header_number;
    }

    /// True while a reservation awaits its commit.
    pub fn is_inside_header(&self) -> bool {
        self.inside_header
    }

    /// Whether commits verify the header CAS and the zeroed tail.
    pub fn assertions(&self) -> bool {
        self.assertions
    }

    pub fn set_assertions(&mut self, assertions: bool) {
        self.assertions = assertions;
    }

    /// Replace the waiting strategy.
    pub fn set_pauser(&mut self, pauser: Box<dyn Pauser>) {
        self.pauser = pauser;
        self.pauser_is_default = false;
    }

    /// Reset cursors, drop any pending reservation, unset the header counter.
    pub fn clear(&mut self) {
        self.buf.clear();
        self.header_number = None;
        self.inside_header = false;
    }

    /// Acquire the wire for the current thread.
    pub fn start_use(&mut self) -> Result<()> {
        self.scope.start_use()
    }

    /// Release one level of ownership.
    pub fn end_use(&mut self) -> Result<()> {
        self.scope.end_use()
    }

    pub fn is_in_use(&self) -> bool {
        self.scope.is_held()
    }

    fn increment_header_number(&mut self) {
        if let Some(n) = self.header_number {
            self.header_number = Some(n + 1);
        }
    }

    // The default busy pauser reacts fastest but burns a core; once a wait
    // actually has to block, switch to the escalating strategy.
    fn upgrade_pauser(&mut self) {
        if self.pauser_is_default {
            self.pauser = Box::new(LongPauser::default());
            self.pauser_is_default = false;
        }
    }

    /// Claim the first header slot. Returns whether this caller is the
    /// stream's initialiser; the winner must populate the meta-data body and
    /// call [`update_first_header`].
    ///
    /// [`update_first_header`]: Framing::update_first_header
    pub fn write_first_header(&mut self) -> Result<bool> {
        let won = self
            .buf
            .cas_u32(0, NOT_INITIALIZED, NOT_COMPLETE_UNKNOWN_LENGTH)?;
        if won {
            self.buf.set_write_position(HEADER_SIZE);
        }
        Ok(won)
    }

    /// Commit the first header in place: patch the length, mark ready+meta.
    pub fn update_first_header(&mut self) -> Result<()> {
        let actual = self.buf.write_position() - HEADER_SIZE;
        if actual > MAX_LENGTH as u64 {
            return Err(FrameError::LengthOutOfRange(actual));
        }
        let len = align_length(actual as u32);
        self.buf.set_write_position(HEADER_SIZE + len as u64);

        let header = META_DATA | len;
        if !self
            .buf
            .cas_u32(0, NOT_COMPLETE_UNKNOWN_LENGTH, header)?
        {
            let found = self.buf.volatile_u32(0)?;
            tracing::error!(found, "first header overwritten by a concurrent initialiser");
            return Err(FrameError::HeaderOverwritten {
                offset: 0,
                expected: NOT_COMPLETE_UNKNOWN_LENGTH,
                found,
            });
        }
        Ok(())
    }

    /// Wait for the first header to become ready, validate it, and bound the
    /// read window to its body.
    pub fn read_first_header(&mut self, timeout: Duration) -> Result<()> {
        let header = loop {
            let header = self.buf.volatile_u32(0)?;
            if is_ready(header) {
                break header;
            }
            if let Err(err) = self.pauser.pause_within(timeout) {
                self.pauser.reset();
                return Err(err);
            }
        };
        self.pauser.reset();

        let len = length_of(header);
        if !is_ready_meta_data(header) || len > MAX_FIRST_HEADER_LENGTH {
            return Err(FrameError::BadFirstHeader { header });
        }
        self.buf.set_read_position(HEADER_SIZE);
        self.buf.set_read_limit(HEADER_SIZE + len as u64);
        Ok(())
    }

    /// Reserve the next document slot.
    ///
    /// `len` is the maximum body length, or `None` when unknown (the commit
    /// adopts the actual length). On success the write window is bounded to
    /// the reserved body and the header offset returned. When another writer
    /// owns the current slot, scans forward document by document, pausing
    /// within `timeout`. `last_position` is an optional observer of the
    /// highest known committed position; when it is more than 1 MiB ahead the
    /// cursor jumps instead of scanning.
    pub fn write_header(
        &mut self,
        len: Option<u32>,
        timeout: Duration,
        last_position: Option<&dyn Fn() -> u64>,
    ) -> Result<u64> {
        if self.inside_header {
            return Err(FrameError::Reentrant);
        }
        if let Some(requested) = len {
            // lengths round up to a word boundary, so the last three values
            // below MAX_LENGTH are unusable too
            if requested > MAX_LENGTH - 3 {
                return Err(FrameError::LengthOutOfRange(requested as u64));
            }
        }
        self.inside_header = true;

        let len = len.map(align_length);
        let word = NOT_COMPLETE | len.unwrap_or(0);

        // Fast path: uncontended slot at the current cursor.
        let pos = self.buf.write_position();
        match self.try_claim(pos, len, word) {
            Ok(Claim::Reserved) => return Ok(pos),
            Ok(Claim::NoSpace { needed, remaining }) => {
                self.inside_header = false;
                return Err(FrameError::NotEnoughSpace { needed, remaining });
            }
            Ok(Claim::Contended) => {}
            Err(err) => {
                self.inside_header = false;
                return Err(err);
            }
        }

        if let Some(last_position) = last_position {
            let last = last_position();
            if last > self.buf.write_position() + SKIP_AHEAD_THRESHOLD {
                tracing::debug!(jump_to = last, "skipping ahead to last known position");
                self.set_header_number(None);
                self.buf.set_write_position(last);
            }
        }

        self.write_header0(len, word, timeout)
    }

    fn write_header0(&mut self, len: Option<u32>, word: u32, timeout: Duration) -> Result<u64> {
        self.upgrade_pauser();
        let mut pos = self.buf.write_position();
        let result = loop {
            match self.try_claim(pos, len, word) {
                Ok(Claim::Reserved) => break Ok(pos),
                Ok(Claim::NoSpace { needed, remaining }) => {
                    self.inside_header = false;
                    break Err(FrameError::NotEnoughSpace { needed, remaining });
                }
                Ok(Claim::Contended) => {}
                Err(err) => {
                    self.inside_header = false;
                    break Err(err);
                }
            }

            if let Err(err) = self.pauser.pause_within(timeout) {
                self.inside_header = false;
                break Err(err);
            }

            let header = match self.buf.volatile_u32(pos) {
                Ok(header) => header,
                Err(err) => {
                    self.inside_header = false;
                    break Err(err.into());
                }
            };
            if header == END_OF_DATA {
                self.inside_header = false;
                break Err(FrameError::EndOfStream);
            }
            if is_not_complete(header) {
                continue;
            }

            pos += HEADER_SIZE + length_of(header) as u64;
            if is_data(header) {
                self.increment_header_number();
            }
        };
        self.pauser.reset();
        result
    }

    // One reservation attempt at `pos`. Space is checked before the CAS so
    // that `NoSpace` always leaves the stream untouched; once the CAS wins
    // the reservation stands and `inside_header` stays set until commit or
    // clear.
    fn try_claim(&mut self, pos: u64, len: Option<u32>, word: u32) -> Result<Claim> {
        let capacity = self.buf.real_capacity();
        if pos + HEADER_SIZE > capacity {
            return Ok(Claim::NoSpace {
                needed: HEADER_SIZE,
                remaining: capacity.saturating_sub(pos),
            });
        }

        let body = pos + HEADER_SIZE;
        let remaining = capacity - body;
        let max_len = match len {
            Some(requested) if requested as u64 > remaining => {
                return Ok(Claim::NoSpace {
                    needed: requested as u64,
                    remaining,
                });
            }
            Some(requested) => requested as u64,
            None => remaining.min(MAX_LENGTH as u64),
        };

        if !self.buf.cas_u32(pos, NOT_INITIALIZED, word)? {
            return Ok(Claim::Contended);
        }
        self.buf.set_write_position(body);
        self.buf.set_write_limit(body + max_len);
        Ok(Claim::Reserved)
    }

    /// Commit the reservation at `position`: the header becomes ready with
    /// the reserved length (or, for an unknown-length reservation, the
    /// aligned actual length) and the requested kind.
    pub fn update_header(&mut self, len: Option<u32>, position: u64, meta: bool) -> Result<()> {
        // Zero-length data documents are disallowed downstream; degenerate
        // empty bodies become a single padding byte instead.
        if self.buf.write_position() == position + HEADER_SIZE {
            self.buf.write_u8(0)?;
        }

        let end_of_body = self.buf.write_position();
        let actual = end_of_body - position - HEADER_SIZE;
        if actual > MAX_LENGTH as u64 {
            return Err(FrameError::LengthOutOfRange(actual));
        }

        let len = len.map(align_length);
        let body_len = match len {
            Some(reserved) => {
                if actual > reserved as u64 {
                    return Err(FrameError::LengthMismatch {
                        reserved,
                        actual: actual as u32,
                    });
                }
                reserved
            }
            None => align_length(actual as u32),
        };

        let expected = NOT_COMPLETE | len.unwrap_or(0);
        let header = body_len | if meta { META_DATA } else { 0 };
        debug_assert!(self.inside_header, "commit without a reservation");

        if self.assertions {
            self.check_no_data_after_end(end_of_body)?;
            if !self.buf.cas_u32(position, expected, header)? {
                let found = self.buf.volatile_u32(position)?;
                tracing::warn!(position, found, "header overwritten before commit");
                return Err(FrameError::HeaderOverwritten {
                    offset: position,
                    expected,
                    found,
                });
            }
        } else {
            self.buf.write_ordered_u32(position, header)?;
        }

        self.inside_header = false;
        self.buf
            .set_write_position(position + HEADER_SIZE + body_len as u64);
        self.buf.set_write_limit(self.buf.real_capacity());
        if !meta {
            self.increment_header_number();
        }
        Ok(())
    }

    // Anything already written past the end of the message indicates a
    // rewind without zeroing, or a stray writer inside our slot.
    fn check_no_data_after_end(&self, pos: u64) -> Result<()> {
        if pos + 4 <= self.buf.real_capacity() {
            let mut probe = [0u8; 4];
            self.buf.read_at(pos, &mut probe)?;
            if probe != [0u8; 4] {
                tracing::warn!(offset = pos, "data written past document end");
                return Err(FrameError::DataBeyondEnd { offset: pos });
            }
        }
        Ok(())
    }

    /// Classify the next document for a reader.
    ///
    /// Skips ready meta-data documents unless `include_meta` is set. Returns
    /// [`FrameError::EndOfStream`] on the terminator. On `Data`/`MetaData`
    /// the read cursor rests on the header; call [`read_and_set_length`] to
    /// bound the window to the body.
    ///
    /// [`read_and_set_length`]: Framing::read_and_set_length
    pub fn read_data_header(&mut self, include_meta: bool) -> Result<HeaderKind> {
        loop {
            let header = self.buf.peek_volatile_u32()?;
            if is_ready(header) {
                if header == NOT_INITIALIZED {
                    return Ok(HeaderKind::None);
                }
                if is_data(header) {
                    return Ok(HeaderKind::Data);
                }
                if include_meta && is_ready_meta_data(header) {
                    return Ok(HeaderKind::MetaData);
                }
                self.buf
                    .read_skip(HEADER_SIZE + length_of(header) as u64)?;
            } else {
                if header == END_OF_DATA {
                    return Err(FrameError::EndOfStream);
                }
                return Ok(HeaderKind::None);
            }
        }
    }

    /// Bound the read window to the body of the ready document at `position`.
    pub fn read_and_set_length(&mut self, position: u64) -> Result<()> {
        let header = self.buf.volatile_u32(position)?;
        if !is_ready(header) || header == NOT_INITIALIZED {
            return Err(FrameError::NotReady {
                offset: position,
                header,
            });
        }
        let start = position + HEADER_SIZE;
        self.buf.set_read_position(start);
        self.buf.set_read_limit(start + length_of(header) as u64);
        Ok(())
    }

    /// Bound the read window to the ready meta-data document at the cursor.
    pub fn read_meta_data_header(&mut self) -> Result<()> {
        let position = self.buf.read_position();
        let header = self.buf.volatile_u32(position)?;
        if !is_ready_meta_data(header) {
            return Err(FrameError::NotReady {
                offset: position,
                header,
            });
        }
        let start = position + HEADER_SIZE;
        self.buf.set_read_position(start);
        self.buf.set_read_limit(start + length_of(header) as u64);
        Ok(())
    }

    /// Terminate the stream by publishing the end-of-data word in the next
    /// free slot. Idempotent: succeeds if the terminator is already present.
    pub fn write_end_of_wire(&mut self, timeout: Duration) -> Result<()> {
        self.upgrade_pauser();
        let mut pos = self.buf.write_position();
        let result = loop {
            let capacity = self.buf.real_capacity();
            if pos + HEADER_SIZE > capacity {
                break Err(FrameError::NotEnoughSpace {
                    needed: HEADER_SIZE,
                    remaining: capacity.saturating_sub(pos),
                });
            }
            match self.buf.cas_u32(pos, NOT_INITIALIZED, END_OF_DATA) {
                Ok(true) => {
                    self.buf.set_write_position(pos + HEADER_SIZE);
                    tracing::debug!(offset = pos, "end of wire written");
                    break Ok(());
                }
                Ok(false) => {}
                Err(err) => break Err(err.into()),
            }

            if let Err(err) = self.pauser.pause_within(timeout) {
                break Err(err);
            }
            let header = match self.buf.volatile_u32(pos) {
                Ok(header) => header,
                Err(err) => break Err(err.into()),
            };
            if header == END_OF_DATA {
                break Ok(()); // already terminated
            }
            if header == NOT_COMPLETE_UNKNOWN_LENGTH {
                continue;
            }
            pos += HEADER_SIZE + length_of(header) as u64;
        };
        self.pauser.reset();
        result
    }
}

enum Claim {
    Reserved,
    Contended,
    NoSpace { needed: u64, remaining: u64 },
}
