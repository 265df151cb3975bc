//! Incremental JSON object writer.
//!
//! The writer moves through `NotStarted -> Streaming -> Finished`. Rows are
//! pushed one at a time in `(locale, key)` order; the encoded bytes accumulate
//! in an internal buffer the caller drains with [`ExportWriter::take`].
//!
//! In grouped layout each locale opens a nested object that stays open until
//! a row for a later locale arrives. A row that would reopen an earlier
//! locale, or repeat or regress a key, is rejected.

use bytes::Bytes;
use polyglot_core::ExportRow;

use crate::error::{ExportError, ExportResult};

/// Output layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// `{key: value}` for a single locale.
    Flat,
    /// `{locale: {key: value}}`.
    Grouped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    NotStarted,
    Streaming,
    Finished,
}

#[derive(Debug)]
pub struct ExportWriter {
    layout: Layout,
    phase: Phase,
    buf: Vec<u8>,
    /// Members written to the outermost object.
    outer_members: usize,
    /// Locale whose nested object is open (grouped) or the locale seen (flat).
    current_locale: Option<String>,
    /// Members written to the open nested object.
    inner_members: usize,
    last_key: Option<String>,
}

impl ExportWriter {
    pub fn new(layout: Layout) -> Self {
        Self {
            layout,
            phase: Phase::NotStarted,
            buf: Vec::with_capacity(8 * 1024),
            outer_members: 0,
            current_locale: None,
            inner_members: 0,
            last_key: None,
        }
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Write the opening delimiter.
    pub fn begin(&mut self) -> ExportResult<()> {
        if self.phase != Phase::NotStarted {
            return Err(ExportError::WriterState("begin called twice"));
        }
        self.buf.push(b'{');
        self.phase = Phase::Streaming;
        Ok(())
    }

    /// Append one row.
    pub fn push(&mut self, row: &ExportRow) -> ExportResult<()> {
        if self.phase != Phase::Streaming {
            return Err(ExportError::WriterState("push outside of streaming phase"));
        }
        match self.layout {
            Layout::Flat => self.push_flat(row),
            Layout::Grouped => self.push_grouped(row),
        }
    }

    /// Close any open objects. Calling it before `begin` yields `{}`.
    pub fn finish(&mut self) -> ExportResult<()> {
        match self.phase {
            Phase::Finished => return Err(ExportError::WriterState("finish called twice")),
            Phase::NotStarted => self.begin()?,
            Phase::Streaming => {}
        }
        if self.layout == Layout::Grouped && self.current_locale.is_some() {
            self.buf.push(b'}');
        }
        self.buf.push(b'}');
        self.phase = Phase::Finished;
        Ok(())
    }

    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Finished
    }

    /// Bytes buffered since the last call.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Drain the buffered bytes.
    pub fn take(&mut self) -> Bytes {
        Bytes::from(std::mem::take(&mut self.buf))
    }

    fn push_flat(&mut self, row: &ExportRow) -> ExportResult<()> {
        match &self.current_locale {
            Some(locale) if *locale != row.locale => {
                return Err(ExportError::OutOfOrder {
                    previous: locale.clone(),
                    next: row.locale.clone(),
                });
            }
            Some(_) => {}
            None => self.current_locale = Some(row.locale.clone()),
        }
        self.check_key(row)?;
        if self.outer_members > 0 {
            self.buf.push(b',');
        }
        self.write_member(&row.key, &row.value)?;
        self.outer_members += 1;
        Ok(())
    }

    fn push_grouped(&mut self, row: &ExportRow) -> ExportResult<()> {
        let open_new = match &self.current_locale {
            None => true,
            Some(current) if *current == row.locale => false,
            Some(current) if row.locale > *current => {
                self.buf.push(b'}');
                true
            }
            Some(current) => {
                return Err(ExportError::OutOfOrder {
                    previous: current.clone(),
                    next: row.locale.clone(),
                });
            }
        };

        if open_new {
            if self.outer_members > 0 {
                self.buf.push(b',');
            }
            self.write_string(&row.locale)?;
            self.buf.extend_from_slice(b":{");
            self.outer_members += 1;
            self.inner_members = 0;
            self.last_key = None;
            self.current_locale = Some(row.locale.clone());
        }

        self.check_key(row)?;
        if self.inner_members > 0 {
            self.buf.push(b',');
        }
        self.write_member(&row.key, &row.value)?;
        self.inner_members += 1;
        Ok(())
    }

    fn check_key(&mut self, row: &ExportRow) -> ExportResult<()> {
        if let Some(last) = &self.last_key {
            if row.key <= *last {
                return Err(ExportError::OutOfOrder {
                    previous: format!("{}/{}", row.locale, last),
                    next: format!("{}/{}", row.locale, row.key),
                });
            }
        }
        self.last_key = Some(row.key.clone());
        Ok(())
    }

    fn write_member(&mut self, name: &str, value: &str) -> ExportResult<()> {
        self.write_string(name)?;
        self.buf.push(b':');
        self.write_string(value)
    }

    fn write_string(&mut self, s: &str) -> ExportResult<()> {
        serde_json::to_writer(&mut self.buf, s).map_err(|e| ExportError::Encode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(layout: Layout, rows: &[ExportRow]) -> ExportResult<String> {
        let mut writer = ExportWriter::new(layout);
        writer.begin()?;
        for row in rows {
            writer.push(row)?;
        }
        writer.finish()?;
        Ok(String::from_utf8(writer.take().to_vec()).unwrap())
    }

    #[test]
    fn test_grouped_layout() {
        let rows = [
            ExportRow::new("en", "a", "1"),
            ExportRow::new("en", "b", "2"),
            ExportRow::new("fr", "a", "3"),
        ];
        assert_eq!(
            render(Layout::Grouped, &rows).unwrap(),
            r#"{"en":{"a":"1","b":"2"},"fr":{"a":"3"}}"#
        );
    }

    #[test]
    fn test_flat_layout() {
        let rows = [ExportRow::new("en", "a", "1"), ExportRow::new("en", "b", "2")];
        assert_eq!(render(Layout::Flat, &rows).unwrap(), r#"{"a":"1","b":"2"}"#);
    }

    #[test]
    fn test_empty_outputs() {
        assert_eq!(render(Layout::Grouped, &[]).unwrap(), "{}");
        assert_eq!(render(Layout::Flat, &[]).unwrap(), "{}");

        let mut writer = ExportWriter::new(Layout::Grouped);
        writer.finish().unwrap();
        assert_eq!(&writer.take()[..], b"{}");
    }

    #[test]
    fn test_reopening_locale_is_rejected() {
        let rows = [
            ExportRow::new("en", "a", "1"),
            ExportRow::new("fr", "a", "2"),
            ExportRow::new("en", "b", "3"),
        ];
        let err = render(Layout::Grouped, &rows).unwrap_err();
        assert!(matches!(err, ExportError::OutOfOrder { .. }));
    }

    #[test]
    fn test_duplicate_key_is_rejected() {
        let rows = [ExportRow::new("en", "a", "1"), ExportRow::new("en", "a", "2")];
        assert!(matches!(
            render(Layout::Flat, &rows),
            Err(ExportError::OutOfOrder { .. })
        ));
        assert!(matches!(
            render(Layout::Grouped, &rows),
            Err(ExportError::OutOfOrder { .. })
        ));
    }

    #[test]
    fn test_flat_rejects_second_locale() {
        let rows = [ExportRow::new("en", "a", "1"), ExportRow::new("fr", "b", "2")];
        assert!(matches!(
            render(Layout::Flat, &rows),
            Err(ExportError::OutOfOrder { .. })
        ));
    }

    #[test]
    fn test_same_key_in_different_locales_is_fine() {
        let rows = [ExportRow::new("en", "z", "1"), ExportRow::new("fr", "a", "2")];
        assert!(render(Layout::Grouped, &rows).is_ok());
    }

    #[test]
    fn test_escaping_round_trips() {
        let value = "say \"hi\" \\ path/to ünïcødé 日本 \n\t\u{0001}";
        let rows = [ExportRow::new("en", "quote\"key", value)];
        let json = render(Layout::Grouped, &rows).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["en"]["quote\"key"], value);
    }

    #[test]
    fn test_state_machine_misuse() {
        let mut writer = ExportWriter::new(Layout::Flat);
        assert!(matches!(
            writer.push(&ExportRow::new("en", "a", "1")),
            Err(ExportError::WriterState(_))
        ));
        writer.begin().unwrap();
        assert!(writer.begin().is_err());
        writer.finish().unwrap();
        assert!(writer.is_finished());
        assert!(writer.finish().is_err());
    }

    #[test]
    fn test_take_drains_incrementally() {
        let mut writer = ExportWriter::new(Layout::Grouped);
        writer.begin().unwrap();
        writer.push(&ExportRow::new("en", "a", "1")).unwrap();
        let first = writer.take();
        assert_eq!(&first[..], br#"{"en":{"a":"1""#);
        assert_eq!(writer.buffered(), 0);
        writer.push(&ExportRow::new("fr", "a", "2")).unwrap();
        writer.finish().unwrap();
        let second = writer.take();
        assert_eq!(&second[..], br#"},"fr":{"a":"2"}}"#);
    }
}
