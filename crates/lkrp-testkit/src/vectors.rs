//! Reference vectors for byte-exact verification.
//!
//! Each vector is a real chain with its expected block hashes, path and
//! members. Human-readable renderings are kept for the blocks operators
//! inspect most.

use serde::Serialize;
use std::sync::Arc;

use lkrp_core::{BlockStream, CryptoService};

/// Two blocks: a Derive block for `m/0'/16'/0'` and a member block.
pub const REFERENCE_STREAM_HEX: &str = concat!(
    "01010102207ba5eefac6605547fc50188ba7880311d3d1240a7ae32e6eaac7499434091c4506210102030405",
    "060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f202101010315b8050c800000008000001080",
    "000000062102839a288f6a76090b64312281d2e7d6b02c4ddf64ed5e7693471b1b445f8195080510a66c5a44",
    "86e870287caa53bbd609af0005500f43341d6f9099a5180fb304a2889b3b0468f05fb0b931d22211753b3411",
    "567abb21981b64261e95bcd44a3512af7c87bbb5a4b6b680c03b5f09e8d9c56a9cb1c0788993a3d9d5c140a2",
    "462cb1930d19062102fbe26c32ab991c1b107156e22fc158c335e0aeedc171381c9d77743c66f41171113704",
    "0c64656275672d643463363164062103d4c61dda2aaf762954fce97396d9be0399e1dc75c3b790c7a34dde85",
    "96a118120104ffffffff12aa05104d305eae5b70b69cf657f3b9f7db58630550898de535f87f7ac775b09c80",
    "827d14efddeeaa9a2b106bfd7fcc91942dc36d6a1751793ba7ec0792ba936f5f1d858bc1fc54ca1a70e8d28a",
    "5b0bf33b5e926f3add372c802b3b9da64bc06e26b9349db5062103d4c61dda2aaf762954fce97396d9be0399",
    "e1dc75c3b790c7a34dde8596a118120621023db66b974b871c6caafdf486c6895518303b140d389e787d2c3b",
    "5527c2df50f403463044022056ab426bd75696cbe9538cb42271e8796ba1576dfe3e2634f0a6f1a636821e50",
    "02205e41ae68ebd8fbff404340a4f0124af25e948aa52500de192d15ff4f8ee92c020101010220154d99eb86",
    "7cfeef249d573fc2e1f3d307c1e49ec1f66e9af1c9dbd21914321106210102030405060708090a0b0c0d0e0f",
    "101112131415161718191a1b1c1d1e1f20210101021137040c64656275672d38306132383906210280a28918",
    "369e12c86feb321cd100fe6d958e55a0bb570576ef718e7a379204db0104ffffffff12aa051027bdb34fb602",
    "8128bfc919f4db7d13780550e792b83f26fac0de46ee8f1a07e53b0e508d9373aa2e8047f0a764204ab0f06a",
    "2fffa9c29599f5d3fe42fefabd9827867157bd14ec7e2bd8ef83c6f9371d7b48d28d9a4499f8ed626ce75fce",
    "c0a0b33f06210280a28918369e12c86feb321cd100fe6d958e55a0bb570576ef718e7a379204db0621027d40",
    "157737671bb04eaca2756b8ec58020ff5c893b10cbfb25b48014c5252dc4034630440220718d20c999689363",
    "9da807b8a9675d944abdc8fded97f73159beba5004fa17f102203338b74a9e6a2e696ea3658d3af4fce95ffa",
    "0f74c11b2c3d37b0ca1b577657e8",
);

/// Parent of the reference stream's first block.
pub const REFERENCE_STREAM_PARENT: &str = "7ba5eefac6605547fc50188ba7880311d3d1240a7ae32e6eaac7499434091c45";

/// Content hashes of the reference stream's blocks.
pub const REFERENCE_STREAM_HASHES: [&str; 2] = [
    "154d99eb867cfeef249d573fc2e1f3d307c1e49ec1f66e9af1c9dbd219143211",
    "b916b2c9215fa02afcdb86c9ab1bb1a3c0e45f54b26199b83de13fc1c6bdbf3f",
];

pub const REFERENCE_STREAM_HUMAN: &str = concat!(
    "Parent: 7ba5eefac6605547fc50188ba7880311d3d1240a7ae32e6eaac7499434091c45\n",
    "Issuer: 0102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f2021\n",
    "Commands:\n",
    "  Derive(0x15):\n",
    "    path: m/0'/16'/0'\n",
    "    groupKey: 02839a288f6a76090b64312281d2e7d6b02c4ddf64ed5e7693471b1b445f819508\n",
    "    initializationVector: a66c5a4486e870287caa53bbd609af00\n",
    "    encryptedXpriv: 0f43341d6f9099a5180fb304a2889b3b0468f05fb0b931d22211753b3411567abb21981b64261e95bcd44a3512af7c87bbb5a4b6b680c03b5f09e8d9c56a9cb1c0788993a3d9d5c140a2462cb1930d19\n",
    "    ephemeralPublicKey: 02fbe26c32ab991c1b107156e22fc158c335e0aeedc171381c9d77743c66f41171\n",
    "  AddMember(0x11):\n",
    "    name: debug-d4c61d\n",
    "    publicKey: 03d4c61dda2aaf762954fce97396d9be0399e1dc75c3b790c7a34dde8596a11812\n",
    "    permissions: 4294967295\n",
    "  PublishKey(0x12):\n",
    "    initializationVector: 4d305eae5b70b69cf657f3b9f7db5863\n",
    "    encryptedXpriv: 898de535f87f7ac775b09c80827d14efddeeaa9a2b106bfd7fcc91942dc36d6a1751793ba7ec0792ba936f5f1d858bc1fc54ca1a70e8d28a5b0bf33b5e926f3add372c802b3b9da64bc06e26b9349db5\n",
    "    recipient: 03d4c61dda2aaf762954fce97396d9be0399e1dc75c3b790c7a34dde8596a11812\n",
    "    ephemeralPublicKey: 023db66b974b871c6caafdf486c6895518303b140d389e787d2c3b5527c2df50f4\n",
    "Signature: 3044022056ab426bd75696cbe9538cb42271e8796ba1576dfe3e2634f0a6f1a636821e5002205e41ae68ebd8fbff404340a4f0124af25e948aa52500de192d15ff4f8ee92c02\n",
    "\n",
    "Parent: 154d99eb867cfeef249d573fc2e1f3d307c1e49ec1f66e9af1c9dbd219143211\n",
    "Issuer: 0102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f2021\n",
    "Commands:\n",
    "  AddMember(0x11):\n",
    "    name: debug-80a289\n",
    "    publicKey: 0280a28918369e12c86feb321cd100fe6d958e55a0bb570576ef718e7a379204db\n",
    "    permissions: 4294967295\n",
    "  PublishKey(0x12):\n",
    "    initializationVector: 27bdb34fb6028128bfc919f4db7d1378\n",
    "    encryptedXpriv: e792b83f26fac0de46ee8f1a07e53b0e508d9373aa2e8047f0a764204ab0f06a2fffa9c29599f5d3fe42fefabd9827867157bd14ec7e2bd8ef83c6f9371d7b48d28d9a4499f8ed626ce75fcec0a0b33f\n",
    "    recipient: 0280a28918369e12c86feb321cd100fe6d958e55a0bb570576ef718e7a379204db\n",
    "    ephemeralPublicKey: 027d40157737671bb04eaca2756b8ec58020ff5c893b10cbfb25b48014c5252dc4\n",
    "Signature: 30440220718d20c9996893639da807b8a9675d944abdc8fded97f73159beba5004fa17f102203338b74a9e6a2e696ea3658d3af4fce95ffa0f74c11b2c3d37b0ca1b577657e8",
);

/// A single block opening `m/0'/16'/1'`.
pub const DERIVE_BLOCK_HEX: &str = concat!(
    "01010102201dbf1752c54b9fb54fb7c363c1e615f72fd961b797e6f09e6c1d1b6edb285a6d06210102030405",
    "060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f202101010315b8050c800000008000001080",
    "0000010621034f37312d9babd8c032e1dd2de33da369fa1ce30f005bbba600d17330ba392cb20510b6da2c97",
    "a3ec8b074f38f1508aed33350550d21f8f307702333f7a593bebd798a6b06eb5904277268a91350a3c1b1ee6",
    "7c24b5a47d228c60d0fbc1524eac1bcf123e6e26b5d71708291cc08dcf49de0bb34bacf20093524ca6565d87",
    "c636b24475b206210293feb66412536d3d71d5c7afac96a36ea8c685889eebcf6f6f82685712fef150113704",
    "0c64656275672d643463363164062103d4c61dda2aaf762954fce97396d9be0399e1dc75c3b790c7a34dde85",
    "96a118120104ffffffff12aa0510e7b736c40b14a830fb23aaded8eae5440550df7e808c794675d0a2d466d4",
    "efc8ecd07d52368016100d34d6fdb8e6da86e92fbbb7110cb56429b83b1cb974ed4b705143f691b5b81468ab",
    "d2c526266a6dee6df4fdf1a9d81fe74cda4f61c98960b4db062103d4c61dda2aaf762954fce97396d9be0399",
    "e1dc75c3b790c7a34dde8596a1181206210245f11d7d78bd227645118abb20b407ff978df87a6bb3c4461d63",
    "3766858f98f503473045022100a0ea9dee12f383132f9072ad4785a4151475d5704aa9ff7f9552e90347b4ce",
    "be022071a3e44c1f4fa64bc6e2f406fa00fcb46f701c99492912bf33c73edfb2d5d171",
);

pub const DERIVE_BLOCK_HASH: &str = "8f30689e335a0709d043c9bdbc6d9a7963961a5b99897eddf664e7251d2a7386";

pub const DERIVE_BLOCK_HUMAN: &str = concat!(
    "Parent: 1dbf1752c54b9fb54fb7c363c1e615f72fd961b797e6f09e6c1d1b6edb285a6d\n",
    "Issuer: 0102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f2021\n",
    "Commands:\n",
    "  Derive(0x15):\n",
    "    path: m/0'/16'/1'\n",
    "    groupKey: 034f37312d9babd8c032e1dd2de33da369fa1ce30f005bbba600d17330ba392cb2\n",
    "    initializationVector: b6da2c97a3ec8b074f38f1508aed3335\n",
    "    encryptedXpriv: d21f8f307702333f7a593bebd798a6b06eb5904277268a91350a3c1b1ee67c24b5a47d228c60d0fbc1524eac1bcf123e6e26b5d71708291cc08dcf49de0bb34bacf20093524ca6565d87c636b24475b2\n",
    "    ephemeralPublicKey: 0293feb66412536d3d71d5c7afac96a36ea8c685889eebcf6f6f82685712fef150\n",
    "  AddMember(0x11):\n",
    "    name: debug-d4c61d\n",
    "    publicKey: 03d4c61dda2aaf762954fce97396d9be0399e1dc75c3b790c7a34dde8596a11812\n",
    "    permissions: 4294967295\n",
    "  PublishKey(0x12):\n",
    "    initializationVector: e7b736c40b14a830fb23aaded8eae544\n",
    "    encryptedXpriv: df7e808c794675d0a2d466d4efc8ecd07d52368016100d34d6fdb8e6da86e92fbbb7110cb56429b83b1cb974ed4b705143f691b5b81468abd2c526266a6dee6df4fdf1a9d81fe74cda4f61c98960b4db\n",
    "    recipient: 03d4c61dda2aaf762954fce97396d9be0399e1dc75c3b790c7a34dde8596a11812\n",
    "    ephemeralPublicKey: 0245f11d7d78bd227645118abb20b407ff978df87a6bb3c4461d633766858f98f5\n",
    "Signature: 3045022100a0ea9dee12f383132f9072ad4785a4151475d5704aa9ff7f9552e90347b4cebe022071a3e44c1f4fa64bc6e2f406fa00fcb46f701c99492912bf33c73edfb2d5d171",
);

/// First of two member blocks with no Derive or Seed command.
pub const MEMBER_BLOCK_A_HEX: &str = concat!(
    "01010102207ba5eefac6605547fc50188ba7880311d3d1240a7ae32e6eaac7499434091c4506210102030405",
    "060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f20210101021137040c64656275672d383061",
    "32383906210280a28918369e12c86feb321cd100fe6d958e55a0bb570576ef718e7a379204db0104ffffffff",
    "12aa051027bdb34fb6028128bfc919f4db7d13780550e792b83f26fac0de46ee8f1a07e53b0e508d9373aa2e",
    "8047f0a764204ab0f06a2fffa9c29599f5d3fe42fefabd9827867157bd14ec7e2bd8ef83c6f9371d7b48d28d",
    "9a4499f8ed626ce75fcec0a0b33f06210280a28918369e12c86feb321cd100fe6d958e55a0bb570576ef718e",
    "7a379204db0621027d40157737671bb04eaca2756b8ec58020ff5c893b10cbfb25b48014c5252dc403463044",
    "0220718d20c9996893639da807b8a9675d944abdc8fded97f73159beba5004fa17f102203338b74a9e6a2e69",
    "6ea3658d3af4fce95ffa0f74c11b2c3d37b0ca1b577657e8",
);

pub const MEMBER_BLOCK_A_HASH: &str = "db6117004833e770ec7454cf2051b29a8643ee167aec44ce17a2c88ab0447aea";

/// Second member block; its parent is [`MEMBER_BLOCK_A_HASH`].
pub const MEMBER_BLOCK_B_HEX: &str = concat!(
    "0101010220db6117004833e770ec7454cf2051b29a8643ee167aec44ce17a2c88ab0447aea06210102030405",
    "060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f20210101021137040c64656275672d643463",
    "363164062103d4c61dda2aaf762954fce97396d9be0399e1dc75c3b790c7a34dde8596a118120104ffffffff",
    "12aa05104d305eae5b70b69cf657f3b9f7db58630550898de535f87f7ac775b09c80827d14efddeeaa9a2b10",
    "6bfd7fcc91942dc36d6a1751793ba7ec0792ba936f5f1d858bc1fc54ca1a70e8d28a5b0bf33b5e926f3add37",
    "2c802b3b9da64bc06e26b9349db5062103d4c61dda2aaf762954fce97396d9be0399e1dc75c3b790c7a34dde",
    "8596a118120621023db66b974b871c6caafdf486c6895518303b140d389e787d2c3b5527c2df50f403463044",
    "022056ab426bd75696cbe9538cb42271e8796ba1576dfe3e2634f0a6f1a636821e5002205e41ae68ebd8fbff",
    "404340a4f0124af25e948aa52500de192d15ff4f8ee92c02",
);

pub const MEMBER_BLOCK_B_HASH: &str = "6c86cc82eb13a7c25e27f4a4987a212bc982d608bb2056b6eae7cef4567d2ff6";

/// A block signed by [`PUBLISHED_KEY_ISSUER_SECRET`] that adds
/// [`PUBLISHED_KEY_MEMBER_SECRET`] and publishes [`published_xpriv`] to it.
pub const PUBLISHED_KEY_BLOCK_HEX: &str = concat!(
    "010101022042424242424242424242424242424242424242424242424242424242424242420621023c72addb",
    "4fdf09af94f0c94d7fe92a386a7e70cf8a1d85916386bb2535c7b1b1010102113004054f574e45520621034f",
    "355bdcb7cc0af728ef3cceb9615d90684bb5b2ca5f859ab0f0b704075871aa0104ffffffff12aa0510a0a1a2",
    "a3a4a5a6a7a8a9aaabacadaeaf0550859938790a78c90ce3ddf717a27476dc80eee2652ff5132650b5821afb",
    "5b905571aec6057eeb39dac4df9a7ae81bba0bdaac01b1981b641b45d84850493859be75572dc841be592c32",
    "5b0b8037d9fd940621034f355bdcb7cc0af728ef3cceb9615d90684bb5b2ca5f859ab0f0b704075871aa0621",
    "02466d7fcae563e5cb09a0d1870bb580344804617879a14949cf22285f1bae3f270347304502210090aa4136",
    "3afda17531590aa56b1017f2ffe20dbd8257d56996a46edc40f5713e0220790b8e8b0a8d6f1a89b0169a2c29",
    "3002d35c74e4cbf63c3f0bd9caf3d54ed98a",
);

pub const PUBLISHED_KEY_BLOCK_HASH: &str = "0a5512c50c86d287083cd4c0d6ae31e276b7be7a3c028225ea5e4d62b0904979";

/// Unsigned prefix length of [`PUBLISHED_KEY_BLOCK_HEX`].
pub const PUBLISHED_KEY_UNSIGNED_LEN: usize = 297;

pub const PUBLISHED_KEY_ISSUER_SECRET: [u8; 32] = [0x33; 32];
pub const PUBLISHED_KEY_MEMBER_SECRET: [u8; 32] = [0x11; 32];

/// Public key of [`PUBLISHED_KEY_MEMBER_SECRET`].
pub const PUBLISHED_KEY_MEMBER: &str =
    "034f355bdcb7cc0af728ef3cceb9615d90684bb5b2ca5f859ab0f0b704075871aa";

/// Member `debug-d4c61d`.
pub const MEMBER_D4C61D: &str =
    "03d4c61dda2aaf762954fce97396d9be0399e1dc75c3b790c7a34dde8596a11812";

/// Member `debug-80a289`.
pub const MEMBER_80A289: &str =
    "0280a28918369e12c86feb321cd100fe6d958e55a0bb570576ef718e7a379204db";

/// The extended private key published in [`PUBLISHED_KEY_BLOCK_HEX`].
pub fn published_xpriv() -> Vec<u8> {
    (0u8..64).collect()
}

/// A stream with everything a conforming decoder must reproduce.
#[derive(Debug, Clone, Serialize)]
pub struct StreamVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// The stream bytes, hex-encoded.
    pub hex: String,
    /// Parent of the first block.
    pub parent: &'static str,
    /// Content hash of each block, in order.
    pub block_hashes: Vec<&'static str>,
    pub path: Option<&'static str>,
    /// Trusted member keys, first occurrence order.
    pub members: Vec<&'static str>,
}

/// Get all stream vectors.
pub fn all_vectors() -> Vec<StreamVector> {
    vec![
        StreamVector {
            name: "derive stream m/0'/16'/0'",
            hex: REFERENCE_STREAM_HEX.to_string(),
            parent: REFERENCE_STREAM_PARENT,
            block_hashes: REFERENCE_STREAM_HASHES.to_vec(),
            path: Some("m/0'/16'/0'"),
            members: vec![MEMBER_D4C61D, MEMBER_80A289],
        },
        StreamVector {
            name: "single derive block m/0'/16'/1'",
            hex: DERIVE_BLOCK_HEX.to_string(),
            parent: "1dbf1752c54b9fb54fb7c363c1e615f72fd961b797e6f09e6c1d1b6edb285a6d",
            block_hashes: vec![DERIVE_BLOCK_HASH],
            path: Some("m/0'/16'/1'"),
            members: vec![MEMBER_D4C61D],
        },
        StreamVector {
            name: "member blocks without path",
            hex: format!("{MEMBER_BLOCK_A_HEX}{MEMBER_BLOCK_B_HEX}"),
            parent: REFERENCE_STREAM_PARENT,
            block_hashes: vec![MEMBER_BLOCK_A_HASH, MEMBER_BLOCK_B_HASH],
            path: None,
            members: vec![MEMBER_80A289, MEMBER_D4C61D],
        },
        StreamVector {
            name: "signed published key block",
            hex: PUBLISHED_KEY_BLOCK_HEX.to_string(),
            parent: "4242424242424242424242424242424242424242424242424242424242424242",
            block_hashes: vec![PUBLISHED_KEY_BLOCK_HASH],
            path: None,
            members: vec![PUBLISHED_KEY_MEMBER],
        },
    ]
}

/// All vectors as JSON, for cross-implementation checks.
pub fn vectors_json() -> serde_json::Result<String> {
    serde_json::to_string_pretty(&all_vectors())
}

/// Decode every vector with `crypto` and report whether it matches.
pub async fn verify_all_vectors(crypto: Arc<dyn CryptoService>) -> Vec<(String, bool)> {
    let mut results = Vec::new();
    for vector in all_vectors() {
        let matches = check_vector(crypto.clone(), &vector).await;
        results.push((vector.name.to_string(), matches));
    }
    results
}

async fn check_vector(crypto: Arc<dyn CryptoService>, vector: &StreamVector) -> bool {
    let Ok(stream) = BlockStream::from_hex(crypto, &vector.hex) else {
        return false;
    };
    let Ok(blocks) = stream.parse() else {
        return false;
    };
    if blocks.len() != vector.block_hashes.len() {
        return false;
    }
    for (block, expected) in blocks.iter().zip(&vector.block_hashes) {
        if block.hash().await.to_hex() != *expected {
            return false;
        }
    }
    let Ok(parent) = hex::decode(vector.parent) else {
        return false;
    };
    let members: Vec<String> = stream.members().iter().map(hex::encode).collect();
    stream.validate(Some(&parent)).await && stream.path() == vector.path && members == vector.members
}

#[cfg(test)]
mod tests {
    use super::*;
    use lkrp_crypto::NativeCryptoService;

    #[tokio::test]
    async fn test_all_vectors_match() {
        let results = verify_all_vectors(Arc::new(NativeCryptoService)).await;
        assert_eq!(results.len(), 4);
        for (name, matches) in results {
            assert!(matches, "vector '{}' does not match", name);
        }
    }

    #[tokio::test]
    async fn test_corrupted_vector_fails() {
        let mut vector = all_vectors().remove(2);
        vector.hex = format!("{MEMBER_BLOCK_A_HEX}{MEMBER_BLOCK_A_HEX}");
        vector.block_hashes = vec![MEMBER_BLOCK_A_HASH, MEMBER_BLOCK_A_HASH];
        assert!(!check_vector(Arc::new(NativeCryptoService), &vector).await);
    }

    #[test]
    fn test_vectors_json() {
        let json = vectors_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value.as_array().unwrap().len(), 4);
        assert_eq!(value[0]["path"], "m/0'/16'/0'");
        assert!(value[2]["path"].is_null());
    }

    #[test]
    fn test_stream_hex_lengths() {
        assert_eq!(REFERENCE_STREAM_HEX.len(), 938 * 2);
        assert_eq!(DERIVE_BLOCK_HEX.len(), 563 * 2);
        assert_eq!(PUBLISHED_KEY_BLOCK_HEX.len(), 370 * 2);
    }
}
