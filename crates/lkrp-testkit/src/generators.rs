//! Proptest generators for property-based testing.

use proptest::prelude::*;
use std::sync::Arc;

use lkrp_core::path::{self, HARDENED};
use lkrp_core::{
    AddMemberData, BlockStream, BlockTemplate, Command, CommandData, CryptoService, DeriveData,
    ParseError, PublishKeyData, SeedData,
};

/// Generate a 33-byte compressed-looking public key.
pub fn public_key() -> impl Strategy<Value = Vec<u8>> {
    (prop_oneof![Just(0x02u8), Just(0x03u8)], any::<[u8; 32]>()).prop_map(|(prefix, x)| {
        let mut key = Vec::with_capacity(33);
        key.push(prefix);
        key.extend_from_slice(&x);
        key
    })
}

/// Generate a 16-byte IV.
pub fn iv() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 16)
}

/// Generate an encrypted xpriv: 64 bytes plus a 16-byte tag.
pub fn encrypted_xpriv() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 80)
}

/// Generate derivation path indices, hardened or not.
pub fn path_indices() -> impl Strategy<Value = Vec<u32>> {
    prop::collection::vec(
        (0u32..HARDENED, any::<bool>()).prop_map(|(i, h)| if h { i | HARDENED } else { i }),
        0..=6,
    )
}

/// Generate a derivation path in string form.
pub fn derivation_path() -> impl Strategy<Value = String> {
    path_indices().prop_map(|indices| path::format(&indices))
}

/// Generate a member name.
pub fn member_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,31}".prop_map(String::from)
}

pub fn add_member_data() -> impl Strategy<Value = AddMemberData> {
    (member_name(), public_key(), any::<u32>()).prop_map(|(name, public_key, permissions)| {
        AddMemberData {
            name,
            public_key,
            permissions,
        }
    })
}

pub fn publish_key_data() -> impl Strategy<Value = PublishKeyData> {
    (iv(), encrypted_xpriv(), public_key(), public_key()).prop_map(
        |(initialization_vector, encrypted_xpriv, recipient, ephemeral_public_key)| {
            PublishKeyData {
                initialization_vector,
                encrypted_xpriv,
                recipient,
                ephemeral_public_key,
            }
        },
    )
}

pub fn seed_data() -> impl Strategy<Value = SeedData> {
    (
        prop::collection::vec(any::<u8>(), 0..=32),
        any::<u16>(),
        public_key(),
        iv(),
        encrypted_xpriv(),
        public_key(),
    )
        .prop_map(
            |(topic, protocol_version, group_key, iv, xpriv, eph)| SeedData {
                topic,
                protocol_version,
                group_key,
                initialization_vector: iv,
                encrypted_xpriv: xpriv,
                ephemeral_public_key: eph,
            },
        )
}

pub fn derive_data() -> impl Strategy<Value = DeriveData> {
    (
        derivation_path(),
        public_key(),
        iv(),
        encrypted_xpriv(),
        public_key(),
    )
        .prop_map(|(path, group_key, iv, xpriv, eph)| DeriveData {
            path,
            group_key,
            initialization_vector: iv,
            encrypted_xpriv: xpriv,
            ephemeral_public_key: eph,
        })
}

/// Generate any encodable command.
pub fn command_data() -> impl Strategy<Value = CommandData> {
    prop_oneof![
        seed_data().prop_map(CommandData::Seed),
        add_member_data().prop_map(CommandData::AddMember),
        publish_key_data().prop_map(CommandData::PublishKey),
        derive_data().prop_map(CommandData::Derive),
    ]
}

/// Parameters for generating a block stream.
#[derive(Debug, Clone)]
pub struct StreamParams {
    pub parent: [u8; 32],
    pub blocks: Vec<BlockParams>,
}

#[derive(Debug, Clone)]
pub struct BlockParams {
    pub issuer: Vec<u8>,
    pub commands: Vec<CommandData>,
    pub signature: Vec<u8>,
}

impl Arbitrary for StreamParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        let block = (
            public_key(),
            prop::collection::vec(command_data(), 1..=3),
            prop::collection::vec(any::<u8>(), 70..=72),
        )
            .prop_map(|(issuer, commands, signature)| BlockParams {
                issuer,
                commands,
                signature,
            });
        (any::<[u8; 32]>(), prop::collection::vec(block, 1..=4))
            .prop_map(|(parent, blocks)| StreamParams { parent, blocks })
            .boxed()
    }
}

/// Build a chained stream from parameters.
pub async fn stream_from_params(
    crypto: Arc<dyn CryptoService>,
    params: &StreamParams,
) -> Result<BlockStream, ParseError> {
    let mut templates = Vec::with_capacity(params.blocks.len());
    for block in &params.blocks {
        let commands = block
            .commands
            .iter()
            .map(Command::from_data)
            .collect::<Result<Vec<_>, _>>()?;
        templates.push(BlockTemplate {
            issuer: block.issuer.clone(),
            commands,
            signature: block.signature.clone(),
        });
    }
    BlockStream::from_data(crypto, templates, Some(&params.parent)).await
}
