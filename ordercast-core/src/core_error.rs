/*
    Copyright 2025 MydriaTech AB

    Licensed under the Apache License 2.0 with Free world makers exception
    1.0.0 (the "License"); you may not use this file except in compliance with
    the License. You should have obtained a copy of the License with the source
    or binary distribution in file named

        LICENSE-Apache-2.0-with-FWM-Exception-1.0.0

    Unless required by applicable law or agreed to in writing, software
    distributed under the License is distributed on an "AS IS" BASIS,
    WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
    See the License for the specific language governing permissions and
    limitations under the License.
*/

//! Backbone errors.

use std::error::Error;
use std::fmt;

/// Cause of error.
#[derive(Debug)]
pub enum CoreErrorKind {
    /// General failure. See message for details.
    Unspecified,
    /// Mandatory configuration is missing or malformed.
    Configuration,
    /// Broker connection, channel or publish failure.
    Messaging,
    /// Event document could not be serialized or parsed.
    Serialization,
    /// The service registry could not be reached this call.
    RegistryUnavailable,
    /// The registry holds no passing instance of the requested service.
    NoHealthyInstances,
    /// Authentication failed.
    AuthenticationFailure,
    /// A rate limit permit was denied.
    RateLimited,
    /// The requested entity does not exist.
    NotFound,
    /// A business rule rejected the operation (carried in event payloads).
    BusinessFailure,
}

impl CoreErrorKind {
    /// Create a new instance with an error message.
    pub fn error_with_msg<S: AsRef<str>>(self, msg: S) -> CoreError {
        CoreError {
            kind: self,
            msg: Some(msg.as_ref().to_string()),
        }
    }

    /// Create a new instance without an error message.
    pub fn error(self) -> CoreError {
        CoreError {
            kind: self,
            msg: None,
        }
    }
}

impl fmt::Display for CoreErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/** Backbone error.

Create a new instance via [CoreErrorKind].
*/
#[derive(Debug)]
pub struct CoreError {
    kind: CoreErrorKind,
    msg: Option<String>,
}

impl CoreError {
    /// Return the type of error.
    pub fn kind(&self) -> &CoreErrorKind {
        &self.kind
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(msg) = &self.msg {
            write!(f, "{} {}", self.kind, msg)
        } else {
            write!(f, "{}", self.kind)
        }
    }
}

impl AsRef<CoreError> for CoreError {
    fn as_ref(&self) -> &CoreError {
        self
    }
}

impl Error for CoreError {}
