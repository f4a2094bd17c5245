#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioCodec {
    /// Linear PCM, platform endian
    PCM,
    /// ADPCM
    ADPCM,
    /// MP3
    MP3,
    /// Linear PCM, little endian
    PCMLittleEndian,
    /// Nellymoser 16kHz mono
    Nellymoser16kHz,
    /// Nellymoser 8kHz mono
    Nellymoser8kHz,
    /// Nellymoser
    Nellymoser,
    /// G.711 A-law
    G711ALaw,
    /// G.711 mu-law
    G711MuLaw,
    /// Reserved
    Reserved,
    /// AAC
    AAC,
    /// Speex
    Speex,
    /// MP3 8kHz
    MP38kHz,
    /// Device specific
    DeviceSpecific,
}

impl AudioCodec {
    /// Parse from sound format field
    pub fn from_sound_format(format: u8) -> Self {
        match format {
            0 => AudioCodec::PCM,
            1 => AudioCodec::ADPCM,
            2 => AudioCodec::MP3,
            3 => AudioCodec::PCMLittleEndian,
            4 => AudioCodec::Nellymoser16kHz,
            5 => AudioCodec::Nellymoser8kHz,
            6 => AudioCodec::Nellymoser,
            7 => AudioCodec::G711ALaw,
            8 => AudioCodec::G711MuLaw,
            9 => AudioCodec::Reserved,
            10 => AudioCodec::AAC,
            11 => AudioCodec::Speex,
            14 => AudioCodec::MP38kHz,
            15 => AudioCodec::DeviceSpecific,
            _ => AudioCodec::Reserved,
        }
    }

    /// Get codec name
    pub fn name(&self) -> &str {
        match self {
            AudioCodec::PCM => "PCM",
            AudioCodec::ADPCM => "ADPCM",
            AudioCodec::MP3 => "MP3",
            AudioCodec::PCMLittleEndian => "PCM-LE",
            AudioCodec::Nellymoser16kHz => "Nellymoser-16kHz",
            AudioCodec::Nellymoser8kHz => "Nellymoser-8kHz",
            AudioCodec::Nellymoser => "Nellymoser",
            AudioCodec::G711ALaw => "G.711-A",
            AudioCodec::G711MuLaw => "G.711-u",
            AudioCodec::Reserved => "Reserved",
            AudioCodec::AAC => "AAC",
            AudioCodec::Speex => "Speex",
            AudioCodec::MP38kHz => "MP3-8kHz",
            AudioCodec::DeviceSpecific => "Device",
        }
    }
}
