use serde::{Deserialize, Serialize};

/// The first index handed out to advocates registered while reading a file.
pub const USER_ADVOCATE_START: u32 = 100;

/// An identification engine that produced (or rescored) a hit. Advocates group the hits of a
/// [`crate::SpectrumMatch`] and are the key into the score normalisation table.
#[non_exhaustive]
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[allow(missing_docs)]
pub enum Advocate {
    Mascot,
    Omssa,
    XTandem,
    PeptideShaker,
    MsAmanda,
    MsGf,
    MyriMatch,
    Comet,
    Tide,
    Andromeda,
    PepNovo,
    DirecTag,
    Byonic,
    Peaks,
    Scaffold,
    MsFit,
    Phenyx,
    ProFound,
    ProteinLynx,
    ProteinProspector,
    ProteinScape,
    Sequest,
    Sqid,
    Sonar,
    SpectraSt,
    SpectrumMill,
    ZCore,
    Percolator,
    /// Used when a generic score is found but the file does not name any software
    GenericMzIdentML,
    /// An engine not known in advance, registered while reading a file
    User { index: u32, name: String },
}

impl Advocate {
    /// All advocates known in advance, in index order.
    pub const KNOWN: &[Self] = &[
        Self::Mascot,
        Self::Omssa,
        Self::XTandem,
        Self::PeptideShaker,
        Self::MsAmanda,
        Self::MsGf,
        Self::MyriMatch,
        Self::Comet,
        Self::Tide,
        Self::Andromeda,
        Self::PepNovo,
        Self::DirecTag,
        Self::Byonic,
        Self::Peaks,
        Self::Scaffold,
        Self::MsFit,
        Self::Phenyx,
        Self::ProFound,
        Self::ProteinLynx,
        Self::ProteinProspector,
        Self::ProteinScape,
        Self::Sequest,
        Self::Sqid,
        Self::Sonar,
        Self::SpectraSt,
        Self::SpectrumMill,
        Self::ZCore,
        Self::Percolator,
        Self::GenericMzIdentML,
    ];

    /// The stable numeric identifier
    pub fn index(&self) -> u32 {
        match self {
            Self::User { index, .. } => *index,
            known => Self::KNOWN
                .iter()
                .position(|a| a == known)
                .map_or(u32::MAX, |i| i as u32),
        }
    }

    /// The display name
    pub fn name(&self) -> &str {
        match self {
            Self::Mascot => "Mascot",
            Self::Omssa => "OMSSA",
            Self::XTandem => "X!Tandem",
            Self::PeptideShaker => "PeptideShaker",
            Self::MsAmanda => "MS Amanda",
            Self::MsGf => "MS-GF+",
            Self::MyriMatch => "MyriMatch",
            Self::Comet => "Comet",
            Self::Tide => "Tide",
            Self::Andromeda => "Andromeda",
            Self::PepNovo => "PepNovo+",
            Self::DirecTag => "DirecTag",
            Self::Byonic => "Byonic",
            Self::Peaks => "PEAKS",
            Self::Scaffold => "Scaffold",
            Self::MsFit => "MS-Fit",
            Self::Phenyx => "Phenyx",
            Self::ProFound => "ProFound",
            Self::ProteinLynx => "ProteinLynx",
            Self::ProteinProspector => "Protein Prospector",
            Self::ProteinScape => "ProteinScape",
            Self::Sequest => "SEQUEST",
            Self::Sqid => "SQID",
            Self::Sonar => "Sonar",
            Self::SpectraSt => "SpectraST",
            Self::SpectrumMill => "SpectrumMill",
            Self::ZCore => "ZCore",
            Self::Percolator => "Percolator",
            Self::GenericMzIdentML => "Generic mzIdentML",
            Self::User { name, .. } => name,
        }
    }

    /// Find a known advocate by name, ignoring case, spaces, and dashes so that for example
    /// `MS-GF+`, `MSGF+`, and `ms gf+` are all recognised.
    pub fn from_name(name: &str) -> Option<Self> {
        let simplify = |text: &str| {
            text.chars()
                .filter(|c| !matches!(c, ' ' | '-' | '_' | '!'))
                .flat_map(char::to_lowercase)
                .collect::<String>()
        };
        let wanted = simplify(name);
        Self::KNOWN
            .iter()
            .find(|a| simplify(a.name()) == wanted)
            .cloned()
    }

    /// Check if this advocate was registered while reading a file instead of known in advance
    pub const fn is_user(&self) -> bool {
        matches!(self, Self::User { .. })
    }
}

impl std::fmt::Display for Advocate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Hands out advocates for engine names, creating user advocates for unknown names. Each
/// unknown name gets one stable index for the lifetime of the registry.
#[derive(Clone, Debug, Default)]
pub struct AdvocateRegistry {
    user: Vec<Advocate>,
}

impl AdvocateRegistry {
    /// Get the advocate for this name, registering a new user advocate if it is not known
    pub fn get_or_register(&mut self, name: &str) -> Advocate {
        if let Some(known) = Advocate::from_name(name) {
            return known;
        }
        if let Some(user) = self.user.iter().find(|a| a.name() == name) {
            return user.clone();
        }
        let advocate = Advocate::User {
            index: USER_ADVOCATE_START + self.user.len() as u32,
            name: name.to_string(),
        };
        self.user.push(advocate.clone());
        advocate
    }
}
