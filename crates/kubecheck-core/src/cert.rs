//! X.509 expiry extraction

use crate::error::CertificateError;
use chrono::{DateTime, Utc};
use x509_parser::parse_x509_certificate;
use x509_parser::pem::parse_x509_pem;

/// Read `notAfter` from a PEM or DER encoded certificate
///
/// For PEM bundles only the first certificate (the leaf) is read.
pub fn not_after(payload: &[u8]) -> Result<DateTime<Utc>, CertificateError> {
    let payload = payload.trim_ascii_start();
    if payload.is_empty() {
        return Err(CertificateError::Empty);
    }

    let timestamp = if payload.starts_with(b"-----BEGIN") {
        let (_, pem) = parse_x509_pem(payload).map_err(|e| CertificateError::Pem(e.to_string()))?;
        let cert = pem
            .parse_x509()
            .map_err(|e| CertificateError::X509(e.to_string()))?;
        cert.validity().not_after.timestamp()
    } else {
        let (_, cert) =
            parse_x509_certificate(payload).map_err(|e| CertificateError::X509(e.to_string()))?;
        cert.validity().not_after.timestamp()
    };

    DateTime::from_timestamp(timestamp, 0).ok_or(CertificateError::OutOfRange(timestamp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const PEM: &[u8] = include_bytes!("../testdata/expires-2036.pem");

    #[test]
    fn test_not_after_from_pem() {
        let expiry = not_after(PEM).unwrap();
        assert_eq!(expiry, Utc.with_ymd_and_hms(2036, 10, 15, 11, 2, 41).unwrap());
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert_eq!(not_after(b"   "), Err(CertificateError::Empty));
        assert!(matches!(
            not_after(b"not a certificate"),
            Err(CertificateError::X509(_))
        ));
        assert!(matches!(
            not_after(b"-----BEGIN CERTIFICATE-----\n!!!\n-----END CERTIFICATE-----\n"),
            Err(CertificateError::Pem(_)) | Err(CertificateError::X509(_))
        ));
    }
}
