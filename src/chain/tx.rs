//! Minimal programmable-transaction builder for read-only view calls.
//!
//! [`ProgrammableTx`] collects shared-object and pure-address inputs and
//! Move calls without type arguments. [`ProgrammableTx::to_bcs`] lowers it
//! to the wire types below and encodes `TransactionKind` with `bcs`.
//! Variant order in the wire enums is the on-chain order; placeholder
//! variants exist only to keep the indices right.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;

use crate::domain::ObjectId;
use crate::domain::object_id::OBJECT_ID_LEN;
use crate::error::GatewayError;

/// Raw 32-byte address, encoded without a length prefix.
pub type Address = [u8; OBJECT_ID_LEN];

/// Transaction kind accepted by `sui_devInspectTransactionBlock`.
#[derive(Debug, Serialize)]
pub enum TransactionKind<'a> {
    /// A programmable transaction block.
    ProgrammableTransaction(&'a ProgrammableTransaction),
}

/// Inputs and commands of a programmable transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProgrammableTransaction {
    /// Call arguments referenced by [`Argument::Input`].
    pub inputs: Vec<CallArg>,
    /// Commands run in order.
    pub commands: Vec<Command>,
}

/// A transaction input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum CallArg {
    /// BCS bytes of a pure value.
    Pure(Vec<u8>),
    /// An object input.
    Object(ObjectArg),
}

/// Object reference `(id, version, digest)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectRef {
    /// Object id.
    pub object_id: Address,
    /// Object version.
    pub version: u64,
    /// Object digest.
    pub digest: Vec<u8>,
}

/// How an object input is passed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ObjectArg {
    /// An owned or immutable object, pinned to a version.
    ImmOrOwnedObject(ObjectRef),
    /// A shared object.
    SharedObject {
        /// Object id.
        id: Address,
        /// Version the object became shared at.
        initial_shared_version: u64,
        /// Whether the call takes `&mut`.
        mutable: bool,
    },
}

/// A command of a programmable transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Command {
    /// A Move function call.
    MoveCall(Box<ProgrammableMoveCall>),
}

/// Target and arguments of a Move call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgrammableMoveCall {
    /// Package address.
    pub package: Address,
    /// Module name.
    pub module: String,
    /// Function name.
    pub function: String,
    /// Type arguments; view calls use none.
    pub type_arguments: Vec<String>,
    /// Call arguments.
    pub arguments: Vec<Argument>,
}

/// A value consumed by a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Argument {
    /// The gas coin.
    GasCoin,
    /// A transaction input by index.
    Input(u16),
    /// The result of an earlier command.
    Result(u16),
    /// One value of an earlier command's tuple result.
    NestedResult(u16, u16),
}

/// Input of a programmable transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Input {
    Pure(Vec<u8>),
    Shared {
        id: ObjectId,
        initial_shared_version: u64,
        mutable: bool,
    },
}

/// A Move call whose arguments are all transaction inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
struct MoveCall {
    package: ObjectId,
    module: String,
    function: String,
    arguments: Vec<u16>,
}

/// Programmable transaction under construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgrammableTx {
    inputs: Vec<Input>,
    calls: Vec<MoveCall>,
}

/// Handle to an input, used as a Move call argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputRef(u16);

impl ProgrammableTx {
    /// Creates an empty transaction.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push_input(&mut self, input: Input) -> Result<InputRef, GatewayError> {
        let index = u16::try_from(self.inputs.len())
            .map_err(|_| GatewayError::Internal("too many transaction inputs".to_string()))?;
        self.inputs.push(input);
        Ok(InputRef(index))
    }

    /// Adds a shared-object input.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Internal`] past `u16::MAX` inputs.
    pub fn shared_object(
        &mut self,
        id: ObjectId,
        initial_shared_version: u64,
        mutable: bool,
    ) -> Result<InputRef, GatewayError> {
        self.push_input(Input::Shared {
            id,
            initial_shared_version,
            mutable,
        })
    }

    /// Adds a pure `address` input.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Internal`] past `u16::MAX` inputs or when
    /// the address cannot be encoded.
    pub fn pure_address(&mut self, address: &ObjectId) -> Result<InputRef, GatewayError> {
        let bytes = bcs::to_bytes(&address.to_bytes()?).map_err(encode_error)?;
        self.push_input(Input::Pure(bytes))
    }

    /// Appends a Move call `package::module::function(args...)`.
    pub fn move_call(
        &mut self,
        package: ObjectId,
        module: impl Into<String>,
        function: impl Into<String>,
        arguments: &[InputRef],
    ) {
        self.calls.push(MoveCall {
            package,
            module: module.into(),
            function: function.into(),
            arguments: arguments.iter().map(|a| a.0).collect(),
        });
    }

    /// Number of Move calls, which is also the number of command results.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.len()
    }

    /// Ids of every shared-object input.
    pub fn shared_object_ids(&self) -> impl Iterator<Item = &ObjectId> {
        self.inputs.iter().filter_map(|input| match input {
            Input::Shared { id, .. } => Some(id),
            Input::Pure(_) => None,
        })
    }

    /// Fully qualified names of the calls, in order.
    pub fn call_targets(&self) -> impl Iterator<Item = String> + '_ {
        self.calls
            .iter()
            .map(|c| format!("{}::{}::{}", c.package, c.module, c.function))
    }

    /// Lowers the builder to its wire form.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Internal`] if an object id cannot be decoded.
    pub fn to_programmable(&self) -> Result<ProgrammableTransaction, GatewayError> {
        let inputs = self
            .inputs
            .iter()
            .map(|input| {
                Ok(match input {
                    Input::Pure(bytes) => CallArg::Pure(bytes.clone()),
                    Input::Shared {
                        id,
                        initial_shared_version,
                        mutable,
                    } => CallArg::Object(ObjectArg::SharedObject {
                        id: id.to_bytes()?,
                        initial_shared_version: *initial_shared_version,
                        mutable: *mutable,
                    }),
                })
            })
            .collect::<Result<Vec<_>, GatewayError>>()?;
        let commands = self
            .calls
            .iter()
            .map(|call| {
                Ok(Command::MoveCall(Box::new(ProgrammableMoveCall {
                    package: call.package.to_bytes()?,
                    module: call.module.clone(),
                    function: call.function.clone(),
                    type_arguments: Vec::new(),
                    arguments: call.arguments.iter().copied().map(Argument::Input).collect(),
                })))
            })
            .collect::<Result<Vec<_>, GatewayError>>()?;
        Ok(ProgrammableTransaction { inputs, commands })
    }

    /// BCS encoding of the transaction kind.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Internal`] if an object id cannot be decoded
    /// or encoding fails.
    pub fn to_bcs(&self) -> Result<Vec<u8>, GatewayError> {
        let programmable = self.to_programmable()?;
        bcs::to_bytes(&TransactionKind::ProgrammableTransaction(&programmable))
            .map_err(encode_error)
    }

    /// Base64 of [`Self::to_bcs`], as expected by the node.
    ///
    /// # Errors
    ///
    /// Same as [`Self::to_bcs`].
    pub fn to_base64(&self) -> Result<String, GatewayError> {
        Ok(STANDARD.encode(self.to_bcs()?))
    }
}

fn encode_error(e: bcs::Error) -> GatewayError {
    GatewayError::Internal(format!("bcs encoding: {e}"))
}
