use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Barcode and 2-D code standards the scanner reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolType {
    UpcE,
    Code39,
    Code39Mod43,
    Ean13,
    Ean8,
    Code93,
    Code128,
    Pdf417,
    Qr,
    Aztec,
    Itf14,
    DataMatrix,
}

impl SymbolType {
    /// Every supported symbol type, in matching priority order
    pub const ALL: [SymbolType; 12] = [
        SymbolType::UpcE,
        SymbolType::Code39,
        SymbolType::Code39Mod43,
        SymbolType::Ean13,
        SymbolType::Ean8,
        SymbolType::Code93,
        SymbolType::Code128,
        SymbolType::Pdf417,
        SymbolType::Qr,
        SymbolType::Aztec,
        SymbolType::Itf14,
        SymbolType::DataMatrix,
    ];

    /// Stable name reported alongside scanned payloads
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolType::UpcE => "upc_e",
            SymbolType::Code39 => "code39",
            SymbolType::Code39Mod43 => "code39_mod43",
            SymbolType::Ean13 => "ean13",
            SymbolType::Ean8 => "ean8",
            SymbolType::Code93 => "code93",
            SymbolType::Code128 => "code128",
            SymbolType::Pdf417 => "pdf417",
            SymbolType::Qr => "qr",
            SymbolType::Aztec => "aztec",
            SymbolType::Itf14 => "itf14",
            SymbolType::DataMatrix => "data_matrix",
        }
    }

    /// Map a zbar symbol type name (as posted in `barcode` bus messages)
    pub fn from_zbar_name(name: &str) -> Option<Self> {
        match name {
            "UPC-E" => Some(SymbolType::UpcE),
            "CODE-39" => Some(SymbolType::Code39),
            "EAN-13" => Some(SymbolType::Ean13),
            "EAN-8" => Some(SymbolType::Ean8),
            "CODE-93" => Some(SymbolType::Code93),
            "CODE-128" => Some(SymbolType::Code128),
            "PDF417" => Some(SymbolType::Pdf417),
            "QR-Code" => Some(SymbolType::Qr),
            "I2/5" => Some(SymbolType::Itf14),
            _ => None,
        }
    }
}

impl fmt::Display for SymbolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SymbolType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        SymbolType::ALL
            .iter()
            .copied()
            .find(|symbol| symbol.as_str() == normalized)
            .ok_or_else(|| format!("Unknown symbol type: {}", s))
    }
}
