use std::str::FromStr;

use crate::error::Error;

/// Default memory ceiling of one fetch batch: 1 GiB.
pub const DEFAULT_BATCH_MEMORY_LIMIT: usize = 1024 * 1024 * 1024;
/// Width in characters or bytes assumed for columns that declare no bound.
pub const DEFAULT_FALLBACK_COLUMN_SIZE: usize = 4096;
pub const DEFAULT_DAE_CHUNK_SIZE: usize = 8192;
pub const DEFAULT_INLINE_THRESHOLD: usize = 8000;
pub const DEFAULT_LOB_CHUNK_SIZE: usize = 4096;

/// Configuration for ODBC buffer settings that control memory usage and performance characteristics.
///
/// These settings decide whether result sets are fetched through bound row arrays or one
/// value at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OdbcBufferSettings {
    /// Fetch rows in batches through column-wise bound arrays.
    ///
    /// A value longer than its bound buffer fails the fetch with
    /// [`Error::BufferTooSmall`](crate::error::Error::BufferTooSmall); it is never truncated.
    Buffered {
        /// Upper bound for the memory one batch of row buffers may take.
        ///
        /// **Performance Impact:**
        /// - The number of rows per batch is derived from this limit and the row width and
        ///   snapped to 1, 10, 100 or 1000
        /// - Lower values mean more round-trips for wide rows
        ///
        /// **Default:** 1 GiB
        batch_memory_limit: usize,

        /// The buffer size (in characters or bytes) for text and binary columns whose
        /// declared width is 0.
        ///
        /// **Memory Impact:**
        /// - Directly controls buffer size for `VARCHAR(MAX)`-like columns
        /// - Values longer than this are read through the large-object path when
        ///   [`OdbcStatementOptions::stream_lobs`] is enabled
        ///
        /// **Default:** 4096
        fallback_column_size: usize,
    },
    /// Fetch rows one by one with `SQLFetch` and read every value with `SQLGetData`.
    ///
    /// This mode allocates no row arrays, which is useful for:
    /// - Small result sets
    /// - Cases where data sizes are variable and not known in advance
    Unbuffered,
}

impl Default for OdbcBufferSettings {
    fn default() -> Self {
        Self::Buffered {
            batch_memory_limit: DEFAULT_BATCH_MEMORY_LIMIT,
            fallback_column_size: DEFAULT_FALLBACK_COLUMN_SIZE,
        }
    }
}

/// Tunables of one [`OdbcStatement`](crate::odbc::OdbcStatement).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OdbcStatementOptions {
    pub(crate) buffer_settings: OdbcBufferSettings,
    pub(crate) dae_chunk_size: usize,
    pub(crate) inline_threshold: usize,
    pub(crate) lob_chunk_size: usize,
    pub(crate) stream_lobs: bool,
}

impl Default for OdbcStatementOptions {
    fn default() -> Self {
        Self {
            buffer_settings: OdbcBufferSettings::default(),
            dae_chunk_size: DEFAULT_DAE_CHUNK_SIZE,
            inline_threshold: DEFAULT_INLINE_THRESHOLD,
            lob_chunk_size: DEFAULT_LOB_CHUNK_SIZE,
            stream_lobs: true,
        }
    }
}

impl OdbcStatementOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the buffer configuration.
    ///
    /// # Example
    /// ```rust
    /// use ddbc_core::odbc::{OdbcBufferSettings, OdbcStatementOptions};
    ///
    /// let mut opts = OdbcStatementOptions::new();
    /// opts.buffer_settings(OdbcBufferSettings::Unbuffered);
    /// assert_eq!(opts.buffer_settings_ref(), &OdbcBufferSettings::Unbuffered);
    /// ```
    pub fn buffer_settings(&mut self, settings: OdbcBufferSettings) -> &mut Self {
        self.buffer_settings = settings;
        self
    }

    /// Sets the memory ceiling of one fetch batch and switches to buffered fetching.
    ///
    /// # Panics
    /// Panics if `limit` is 0.
    pub fn batch_memory_limit(&mut self, limit: usize) -> &mut Self {
        assert!(limit > 0, "batch_memory_limit must be greater than 0");
        match &mut self.buffer_settings {
            OdbcBufferSettings::Buffered {
                batch_memory_limit, ..
            } => *batch_memory_limit = limit,
            OdbcBufferSettings::Unbuffered => {
                self.buffer_settings = OdbcBufferSettings::Buffered {
                    batch_memory_limit: limit,
                    fallback_column_size: DEFAULT_FALLBACK_COLUMN_SIZE,
                };
            }
        }
        self
    }

    /// Sets the width assumed for unbounded columns and switches to buffered fetching.
    ///
    /// # Panics
    /// Panics if `size` is 0.
    pub fn fallback_column_size(&mut self, size: usize) -> &mut Self {
        assert!(size > 0, "fallback_column_size must be greater than 0");
        match &mut self.buffer_settings {
            OdbcBufferSettings::Buffered {
                fallback_column_size,
                ..
            } => *fallback_column_size = size,
            OdbcBufferSettings::Unbuffered => {
                self.buffer_settings = OdbcBufferSettings::Buffered {
                    batch_memory_limit: DEFAULT_BATCH_MEMORY_LIMIT,
                    fallback_column_size: size,
                };
            }
        }
        self
    }

    /// Sets the number of bytes (or wide characters) sent per `SQLPutData` call.
    ///
    /// # Panics
    /// Panics if `size` is 0.
    pub fn dae_chunk_size(&mut self, size: usize) -> &mut Self {
        assert!(size > 0, "dae_chunk_size must be greater than 0");
        self.dae_chunk_size = size;
        self
    }

    /// Sets the largest parameter, in bytes, that is bound inline. Longer text and binary
    /// values are sent as data-at-execution.
    pub fn inline_threshold(&mut self, threshold: usize) -> &mut Self {
        self.inline_threshold = threshold;
        self
    }

    /// Sets the number of characters or bytes read per `SQLGetData` call for large values.
    ///
    /// # Panics
    /// Panics if `size` is 0.
    pub fn lob_chunk_size(&mut self, size: usize) -> &mut Self {
        assert!(size > 0, "lob_chunk_size must be greater than 0");
        self.lob_chunk_size = size;
        self
    }

    /// Whether result sets with unbounded or very wide columns are fetched row by row so
    /// their values are read completely.
    pub fn stream_lobs(&mut self, enabled: bool) -> &mut Self {
        self.stream_lobs = enabled;
        self
    }

    pub fn buffer_settings_ref(&self) -> &OdbcBufferSettings {
        &self.buffer_settings
    }

    pub fn dae_chunk_size_value(&self) -> usize {
        self.dae_chunk_size
    }

    pub fn inline_threshold_value(&self) -> usize {
        self.inline_threshold
    }

    pub fn lob_chunk_size_value(&self) -> usize {
        self.lob_chunk_size
    }

    pub fn stream_lobs_enabled(&self) -> bool {
        self.stream_lobs
    }

    /// The width assumed for unbounded columns, also when fetching unbuffered.
    pub fn effective_fallback_column_size(&self) -> usize {
        match self.buffer_settings {
            OdbcBufferSettings::Buffered {
                fallback_column_size,
                ..
            } => fallback_column_size,
            OdbcBufferSettings::Unbuffered => DEFAULT_FALLBACK_COLUMN_SIZE,
        }
    }
}

fn parse_size(key: &str, value: &str) -> Result<usize, Error> {
    let size = value
        .parse::<usize>()
        .map_err(|e| Error::config(format!("invalid value {:?} for {}: {}", value, key, e)))?;
    if size == 0 {
        return Err(Error::config(format!("{} must be greater than 0", key)));
    }
    Ok(size)
}

fn parse_bool(key: &str, value: &str) -> Result<bool, Error> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(Error::config(format!("invalid value {:?} for {}", value, key))),
    }
}

impl FromStr for OdbcStatementOptions {
    type Err = Error;

    /// Parses `key=value` pairs separated by `;`, as in an ODBC connection string.
    ///
    /// Keys are case-insensitive: `buffered`, `batch_memory_limit`, `fallback_column_size`,
    /// `dae_chunk_size`, `inline_threshold`, `lob_chunk_size` and `stream_lobs`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut opts = Self::default();
        let mut buffered = true;

        for pair in s.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| Error::config(format!("expected key=value, got {:?}", pair)))?;
            let key = key.trim().to_ascii_lowercase();
            let value = value.trim();

            match key.as_str() {
                "buffered" => buffered = parse_bool(&key, value)?,
                "batch_memory_limit" => {
                    opts.batch_memory_limit(parse_size(&key, value)?);
                }
                "fallback_column_size" => {
                    opts.fallback_column_size(parse_size(&key, value)?);
                }
                "dae_chunk_size" => {
                    opts.dae_chunk_size(parse_size(&key, value)?);
                }
                "inline_threshold" => {
                    let threshold = value.parse::<usize>().map_err(|e| {
                        Error::config(format!("invalid value {:?} for {}: {}", value, key, e))
                    })?;
                    opts.inline_threshold(threshold);
                }
                "lob_chunk_size" => {
                    opts.lob_chunk_size(parse_size(&key, value)?);
                }
                "stream_lobs" => {
                    opts.stream_lobs(parse_bool(&key, value)?);
                }
                _ => return Err(Error::config(format!("unknown statement option {:?}", key))),
            }
        }

        if !buffered {
            opts.buffer_settings(OdbcBufferSettings::Unbuffered);
        }
        Ok(opts)
    }
}
