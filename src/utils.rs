//! Utility functions for the glucose-rust-ble crate.

/// mg/dL per mmol/L of glucose (molar mass 180.16 g/mol).
pub const MG_DL_PER_MMOL_L: f32 = 18.016;

/// Convert a glucose concentration from mmol/L to mg/dL.
///
/// # Example
///
/// ```
/// use glucose_rust_ble::mmol_to_mg_dl;
///
/// let mg_dl = mmol_to_mg_dl(5.5);
/// assert!((mg_dl - 99.088).abs() < 0.001);
/// ```
#[inline]
pub fn mmol_to_mg_dl(mmol_per_l: f32) -> f32 {
    mmol_per_l * MG_DL_PER_MMOL_L
}

/// Convert a glucose concentration from mg/dL to mmol/L.
///
/// # Example
///
/// ```
/// use glucose_rust_ble::mg_dl_to_mmol;
///
/// let mmol = mg_dl_to_mmol(180.16);
/// assert!((mmol - 10.0).abs() < 0.001);
/// ```
#[inline]
pub fn mg_dl_to_mmol(mg_per_dl: f32) -> f32 {
    mg_per_dl / MG_DL_PER_MMOL_L
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mmol_to_mg_dl() {
        assert!((mmol_to_mg_dl(0.0) - 0.0).abs() < 0.001);
        assert!((mmol_to_mg_dl(10.0) - 180.16).abs() < 0.001);
    }

    #[test]
    fn test_mg_dl_to_mmol() {
        assert!((mg_dl_to_mmol(18.016) - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_glucose_roundtrip() {
        let original = 6.2;
        let converted = mg_dl_to_mmol(mmol_to_mg_dl(original));
        assert!((converted - original).abs() < 0.0001);
    }
}
