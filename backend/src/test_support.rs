//! Helpers shared by unit tests and the `tests/` suites.
//!
//! Compiled for tests and under the `test-support` feature only.

pub mod cap_fs {
    //! File writes through `cap_std`, for tests that stage key files and
    //! blob roots.

    use std::io;
    use std::path::Path;

    use cap_std::{ambient_authority, fs::Dir};

    /// Write `contents` to `path`, opening the parent as a capability.
    ///
    /// # Errors
    ///
    /// Fails when `path` has no file name or the parent cannot be opened.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use postboard::test_support::cap_fs::write_file;
    ///
    /// let dir = tempfile::tempdir()?;
    /// let key = dir.path().join("message.key");
    /// write_file(&key, b"00ff\n")?;
    /// assert!(key.is_file());
    /// # Ok::<(), std::io::Error>(())
    /// ```
    pub fn write_file(path: &Path, contents: &[u8]) -> io::Result<()> {
        let name = path.file_name().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "path has no file name")
        })?;
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        Dir::open_ambient_dir(parent, ambient_authority())?.write(name, contents)
    }
}

pub mod clock {
    //! Frozen clock for service tests.

    use std::sync::Arc;

    use chrono::{DateTime, Local, TimeZone, Utc};
    use mockable::Clock;

    /// Instant every fixture clock reports: 2026-01-05T09:30:00Z.
    pub fn fixture_timestamp() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 5, 9, 30, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }

    /// Clock frozen at [`fixture_timestamp`].
    ///
    /// # Examples
    ///
    /// ```rust
    /// use mockable::Clock;
    /// use postboard::test_support::clock::{fixture_clock, fixture_timestamp};
    ///
    /// assert_eq!(fixture_clock().utc(), fixture_timestamp());
    /// ```
    pub fn fixture_clock() -> Arc<dyn Clock> {
        Arc::new(FrozenClock(fixture_timestamp()))
    }

    #[derive(Debug, Clone, Copy)]
    struct FrozenClock(DateTime<Utc>);

    impl Clock for FrozenClock {
        fn local(&self) -> DateTime<Local> {
            self.0.with_timezone(&Local)
        }

        fn utc(&self) -> DateTime<Utc> {
            self.0
        }
    }
}
