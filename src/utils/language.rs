use crate::error::{Result, TsError};
use bytes::{BufMut, BytesMut};

/// Size in bytes of an ISO-639 language code in descriptors.
pub const ISO639_SIZE: usize = 3;

/// Decodes a 3-byte ISO-639 language code.
///
/// Bytes are interpreted as ISO-8859-1, missing bytes yield a shorter string.
pub fn iso639_language(data: &[u8]) -> String {
    data.iter()
        .take(ISO639_SIZE)
        .map(|&b| char::from(b))
        .collect()
}

/// Appends a 3-character ISO-639 language code to `buf`.
pub fn append_iso639_language(language: &str, buf: &mut BytesMut) -> Result<()> {
    let bytes: Vec<u8> = language
        .chars()
        .map(|c| u8::try_from(u32::from(c)).ok())
        .collect::<Option<Vec<u8>>>()
        .ok_or_else(|| TsError::InvalidData(format!("non latin-1 language code {:?}", language)))?;
    if bytes.len() != ISO639_SIZE {
        return Err(TsError::InvalidData(format!(
            "language code {:?} is not {} characters long",
            language, ISO639_SIZE
        )));
    }
    buf.put_slice(&bytes);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_codes() {
        assert_eq!(iso639_language(b"fra"), "fra");
        assert_eq!(iso639_language(b"en"), "en");

        let mut buf = BytesMut::new();
        append_iso639_language("deu", &mut buf).unwrap();
        assert_eq!(&buf[..], b"deu");
        assert!(append_iso639_language("english", &mut buf).is_err());
        assert_eq!(buf.len(), 3);
    }
}
