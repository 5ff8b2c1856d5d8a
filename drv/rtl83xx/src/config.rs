// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Static SerDes configuration, as a board description would name it
use serde::{Deserialize, Serialize};

/// Electrical / protocol mode of a SerDes lane
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SerdesMode {
    Sgmii,
    Hsgmii,
    Base1000X,
    Base2500X,
    Base10GR,
    Xgmii,
    Usxgmii,
    Qsgmii,
    /// Lane powered down
    Off,
}

impl SerdesMode {
    pub fn is_10g(&self) -> bool {
        matches!(
            self,
            SerdesMode::Base10GR | SerdesMode::Xgmii | SerdesMode::Usxgmii
        )
    }
}

/// One SerDes-attached port of an RTL930x
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerdesPort {
    pub port: u8,
    pub lane: u8,
    pub mode: SerdesMode,
}
