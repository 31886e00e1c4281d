//! Provisioning and network lifecycle commands
//!
//! This module contains the commands that prepare the modem for joining the
//! network and start or stop it:
//! - Network preferences (LoRaWAN or private network, adaptive data rate)
//! - Device address
//! - Application and network session keys
//! - Network start and stop
//!
//! The address and keys have fixed sizes; slices of any other length are
//! rejected when converting them into [`DevAddress`] or [`SessionKey`].

use bitflags::bitflags;
use core::convert::Infallible;
use core::fmt;

use crate::commands::CommandStatus;
use crate::{Command, Error, NoParameters, ToByteArray};

bitflags! {
    /// Network preference flags
    ///
    /// Selects the network flavour and whether the modem may adapt its data
    /// rate on its own.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct NetworkPreferences: u8 {
        /// When set, join a public LoRaWAN network
        /// When clear, use a private network
        const LORAWAN = 1 << 7;
        /// When set, the modem uses adaptive data rate
        const ADAPTIVE_DATA_RATE = 1 << 5;
    }
}

/// Network flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NetworkMode {
    /// Public LoRaWAN network
    LoRaWan,
    /// Private network
    Private,
}

impl NetworkPreferences {
    /// Builds the preference flags for a network mode and ADR setting
    pub fn new(mode: NetworkMode, adaptive_data_rate: bool) -> Self {
        let mut preferences = match mode {
            NetworkMode::LoRaWan => Self::LORAWAN,
            NetworkMode::Private => Self::empty(),
        };
        preferences.set(Self::ADAPTIVE_DATA_RATE, adaptive_data_rate);
        preferences
    }

    /// Network flavour selected by these flags
    pub fn mode(self) -> NetworkMode {
        if self.contains(Self::LORAWAN) {
            NetworkMode::LoRaWan
        } else {
            NetworkMode::Private
        }
    }
}

impl ToByteArray for NetworkPreferences {
    type Error = Infallible;
    type Array = [u8; 1];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        Ok([self.bits()])
    }
}

/// SetNetworkPreferences command (0x25)
#[derive(Debug, Clone)]
pub struct SetNetworkPreferences {
    /// Preference flags
    pub preferences: NetworkPreferences,
}

impl Command for SetNetworkPreferences {
    type IdType = u8;
    type CommandParameters = NetworkPreferences;
    type ResponseParameters = CommandStatus;

    fn id() -> Self::IdType {
        0x25
    }

    fn invoking_parameters(self) -> Self::CommandParameters {
        self.preferences
    }
}

/// 4 byte device address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DevAddress([u8; DevAddress::LEN]);

impl DevAddress {
    /// Address length in bytes
    pub const LEN: usize = 4;

    /// Wraps raw address bytes
    pub const fn new(bytes: [u8; Self::LEN]) -> Self {
        Self(bytes)
    }

    /// Raw address bytes
    pub fn as_bytes(&self) -> &[u8; Self::LEN] {
        &self.0
    }
}

impl TryFrom<&[u8]> for DevAddress {
    type Error = Error;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let bytes = bytes.try_into().map_err(|_| Error::InvalidLength {
            expected: Self::LEN,
            actual: bytes.len(),
        })?;
        Ok(Self(bytes))
    }
}

impl ToByteArray for DevAddress {
    type Error = Infallible;
    type Array = [u8; DevAddress::LEN];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        Ok(self.0)
    }
}

/// SetDevAddress command (0x21)
///
/// Assigns the address the modem uses on the network. The address cannot
/// change while the network is running.
#[derive(Debug, Clone)]
pub struct SetDevAddress {
    /// Device address
    pub address: DevAddress,
}

impl Command for SetDevAddress {
    type IdType = u8;
    type CommandParameters = DevAddress;
    type ResponseParameters = CommandStatus;

    fn id() -> Self::IdType {
        0x21
    }

    fn invoking_parameters(self) -> Self::CommandParameters {
        self.address
    }
}

/// 16 byte session key
///
/// Key bytes are never printed, neither through `Debug` nor through the
/// driver's logging.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionKey([u8; SessionKey::LEN]);

impl SessionKey {
    /// Key length in bytes
    pub const LEN: usize = 16;

    /// Wraps raw key bytes
    pub const fn new(bytes: [u8; Self::LEN]) -> Self {
        Self(bytes)
    }

    /// Raw key bytes
    pub fn as_bytes(&self) -> &[u8; Self::LEN] {
        &self.0
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionKey(..)")
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for SessionKey {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "SessionKey(..)")
    }
}

impl TryFrom<&[u8]> for SessionKey {
    type Error = Error;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let bytes = bytes.try_into().map_err(|_| Error::InvalidLength {
            expected: Self::LEN,
            actual: bytes.len(),
        })?;
        Ok(Self(bytes))
    }
}

impl ToByteArray for SessionKey {
    type Error = Infallible;
    type Array = [u8; SessionKey::LEN];

    fn to_bytes(self) -> Result<Self::Array, Self::Error> {
        Ok(self.0)
    }
}

/// SetAppSessionKey command (0x27)
///
/// Sets the application session key (AppSKey) used to encrypt payloads.
#[derive(Debug, Clone)]
pub struct SetAppSessionKey {
    /// Application session key
    pub key: SessionKey,
}

impl Command for SetAppSessionKey {
    type IdType = u8;
    type CommandParameters = SessionKey;
    type ResponseParameters = CommandStatus;

    fn id() -> Self::IdType {
        0x27
    }

    fn invoking_parameters(self) -> Self::CommandParameters {
        self.key
    }
}

/// SetNetworkSessionKey command (0x26)
///
/// Sets the network session key (NwkSKey) used for message integrity.
#[derive(Debug, Clone)]
pub struct SetNetworkSessionKey {
    /// Network session key
    pub key: SessionKey,
}

impl Command for SetNetworkSessionKey {
    type IdType = u8;
    type CommandParameters = SessionKey;
    type ResponseParameters = CommandStatus;

    fn id() -> Self::IdType {
        0x26
    }

    fn invoking_parameters(self) -> Self::CommandParameters {
        self.key
    }
}

/// StartNetwork command (0x30)
///
/// Starts network operation with the provisioned address and keys.
///
/// # Important Notes
/// - A device address must have been set
/// - The response status tells whether the modem accepted the configuration
#[derive(Debug, Clone)]
pub struct StartNetwork;

impl Command for StartNetwork {
    type IdType = u8;
    type CommandParameters = NoParameters;
    type ResponseParameters = CommandStatus;

    fn id() -> Self::IdType {
        0x30
    }

    fn invoking_parameters(self) -> Self::CommandParameters {
        NoParameters::default()
    }
}

/// StopNetwork command (0x31)
#[derive(Debug, Clone)]
pub struct StopNetwork;

impl Command for StopNetwork {
    type IdType = u8;
    type CommandParameters = NoParameters;
    type ResponseParameters = CommandStatus;

    fn id() -> Self::IdType {
        0x31
    }

    fn invoking_parameters(self) -> Self::CommandParameters {
        NoParameters::default()
    }
}
