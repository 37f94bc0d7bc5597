use std::error::Error;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Defines the interface for parsing one of the pipeline's file formats.
///
/// Readers may carry parameters (a topology to partition coordinates against, a title
/// prefix to skip), which is why the methods take `&self`.
pub trait FormatReader {
    /// The value produced by a successful parse.
    type Output;

    /// The error type for parse and I/O failures.
    type Error: Error + From<io::Error>;

    /// Parses the format from a buffered reader.
    ///
    /// # Errors
    ///
    /// Returns an error if the content does not match the grammar or reading fails.
    fn read_from(&self, reader: &mut impl BufRead) -> Result<Self::Output, Self::Error>;

    /// Opens `path` and parses it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or parsing fails.
    fn read_from_path<P: AsRef<Path>>(&self, path: P) -> Result<Self::Output, Self::Error> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        self.read_from(&mut reader)
    }

    /// Parses an in-memory document.
    fn read_from_str(&self, content: &str) -> Result<Self::Output, Self::Error> {
        let mut reader = content.as_bytes();
        self.read_from(&mut reader)
    }
}

/// Defines the interface for generating one of the pipeline's file formats.
pub trait FormatWriter {
    /// The value serialized by this writer.
    type Input: ?Sized;

    /// The error type for I/O failures and unrepresentable input.
    type Error: Error + From<io::Error>;

    /// Writes `input` to `writer`.
    ///
    /// # Errors
    ///
    /// Returns an error if the input cannot be represented or writing fails.
    fn write_to(&self, input: &Self::Input, writer: &mut impl Write) -> Result<(), Self::Error>;

    /// Creates (or truncates) `path` and writes `input` to it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or writing fails.
    fn write_to_path<P: AsRef<Path>>(
        &self,
        input: &Self::Input,
        path: P,
    ) -> Result<(), Self::Error> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        self.write_to(input, &mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Renders `input` into a string.
    fn write_to_string(&self, input: &Self::Input) -> Result<String, Self::Error> {
        let mut buffer = Vec::new();
        self.write_to(input, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
