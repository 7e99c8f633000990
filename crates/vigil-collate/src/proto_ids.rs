// SPDX-License-Identifier: MIT OR Apache-2.0
//! Service protocol classifications.

use serde::{Deserialize, Serialize};

/// Transport protocol of a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// TCP.
    #[default]
    Tcp,
    /// UDP.
    Udp,
}

impl Transport {
    /// The transport's CSV name.
    pub fn as_str(self) -> &'static str {
        match self {
            Transport::Tcp => "tcp",
            Transport::Udp => "udp",
        }
    }
}

/// Application protocol id carried in banner events.
///
/// The numbering is part of the banner event contract: new protocols are
/// appended at the end so values stay consistent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u16)]
pub enum ProtoId {
    /// Sentinel: not classified.
    #[default]
    Unknown = 0,
    /// SMTP.
    Smtp = 1,
    /// SMTP over TLS.
    Smtps = 2,
    /// DNS.
    Dns = 3,
    /// HTTP.
    Http = 4,
    /// HTTP over TLS.
    Https = 5,
    /// POP3.
    Pop3 = 6,
    /// POP3 over TLS.
    Pop3s = 7,
    /// IMAP.
    Imap = 8,
    /// IMAP over TLS.
    Imaps = 9,
    /// IRC.
    Irc = 10,
    /// IRC over TLS.
    Ircs = 11,
    /// FTP.
    Ftp = 12,
    /// FTP over TLS.
    Ftps = 13,
    /// SSH.
    Ssh = 14,
}

impl ProtoId {
    /// Decode a banner event protocol id; unknown values collapse to
    /// [`ProtoId::Unknown`].
    pub fn from_u16(v: u16) -> Self {
        match v {
            1 => Self::Smtp,
            2 => Self::Smtps,
            3 => Self::Dns,
            4 => Self::Http,
            5 => Self::Https,
            6 => Self::Pop3,
            7 => Self::Pop3s,
            8 => Self::Imap,
            9 => Self::Imaps,
            10 => Self::Irc,
            11 => Self::Ircs,
            12 => Self::Ftp,
            13 => Self::Ftps,
            14 => Self::Ssh,
            _ => Self::Unknown,
        }
    }

    /// The service name used in CSV output.
    pub fn name(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Smtp => "smtp",
            Self::Smtps => "smtps",
            Self::Dns => "dns",
            Self::Http => "http",
            Self::Https => "https",
            Self::Pop3 => "pop3",
            Self::Pop3s => "pop3s",
            Self::Imap => "imap",
            Self::Imaps => "imaps",
            Self::Irc => "irc",
            Self::Ircs => "ircs",
            Self::Ftp => "ftp",
            Self::Ftps => "ftps",
            Self::Ssh => "ssh",
        }
    }

    /// Best-guess classification from a well-known port.
    pub fn from_port(port: u16) -> Self {
        match port {
            25 | 587 => Self::Smtp,
            465 => Self::Smtps,
            53 => Self::Dns,
            80 | 8080 => Self::Http,
            443 | 8443 => Self::Https,
            110 => Self::Pop3,
            995 => Self::Pop3s,
            143 => Self::Imap,
            993 => Self::Imaps,
            194 | 6667 => Self::Irc,
            994 | 6697 => Self::Ircs,
            21 => Self::Ftp,
            990 => Self::Ftps,
            22 => Self::Ssh,
            _ => Self::Unknown,
        }
    }

    /// `true` for the sentinel value.
    pub fn is_unknown(self) -> bool {
        self == Self::Unknown
    }
}
