//! Byte-exact checks against the reference vectors with the native backend.

use std::sync::Arc;

use anyhow::Result;
use lkrp::{
    Block, BlockStream, CommandData, CryptoService, KeyPair, KeyringError, NativeCryptoService,
    ParseError, Secp256k1KeyPair, Trustchain, TrustchainConfig,
};
use lkrp_core::block::BlockData;
use lkrp_core::TlvError;
use lkrp_testkit::vectors::*;

fn crypto() -> Arc<dyn CryptoService> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    Arc::new(NativeCryptoService)
}

fn hex_bytes(s: &str) -> Vec<u8> {
    hex::decode(s).unwrap()
}

#[tokio::test]
async fn reference_stream_parses_and_validates() -> Result<()> {
    let stream = BlockStream::from_hex(crypto(), REFERENCE_STREAM_HEX)?;
    let blocks = stream.parse()?;
    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[0].as_bytes().len(), 562);

    for (block, expected) in blocks.iter().zip(REFERENCE_STREAM_HASHES) {
        assert_eq!(block.hash().await.to_hex(), expected);
    }
    assert_eq!(blocks[1].parse()?.parent_hex(), REFERENCE_STREAM_HASHES[0]);

    let parent = hex_bytes(REFERENCE_STREAM_PARENT);
    assert!(stream.validate(Some(&parent)).await);
    assert!(stream.validate(None).await);
    assert!(!stream.validate(Some(&[0x01, 0x23, 0x45])).await);
    assert_eq!(stream.path(), Some("m/0'/16'/0'"));
    assert_eq!(stream.to_hex(), REFERENCE_STREAM_HEX);
    Ok(())
}

#[tokio::test]
async fn reference_stream_human_readable() -> Result<()> {
    let stream = BlockStream::from_hex(crypto(), REFERENCE_STREAM_HEX)?;
    assert_eq!(stream.human_readable()?, REFERENCE_STREAM_HUMAN);
    Ok(())
}

#[tokio::test]
async fn relinked_reference_stream_is_invalid() -> Result<()> {
    let relinked = REFERENCE_STREAM_HEX.replacen(REFERENCE_STREAM_HASHES[0], REFERENCE_STREAM_PARENT, 1);
    assert_ne!(relinked, REFERENCE_STREAM_HEX);

    let stream = BlockStream::from_hex(crypto(), &relinked)?;
    assert_eq!(stream.parse()?.len(), 2);
    assert!(!stream.validate(Some(&[0x01, 0x23, 0x45, 0x56, 0x78])).await);
    assert!(!stream.validate(None).await);
    Ok(())
}

#[tokio::test]
async fn reference_stream_rebuilds_from_data() -> Result<()> {
    let crypto = crypto();
    let stream = BlockStream::from_hex(crypto.clone(), REFERENCE_STREAM_HEX)?;
    let templates = stream
        .parse()?
        .iter()
        .map(|block| {
            let parsed = block.parse()?;
            Ok(lkrp_core::BlockTemplate {
                issuer: parsed.issuer.to_vec(),
                commands: parsed.commands.clone(),
                signature: parsed.signature.to_vec(),
            })
        })
        .collect::<std::result::Result<Vec<_>, ParseError>>()?;

    let parent = hex_bytes(REFERENCE_STREAM_PARENT);
    let rebuilt = BlockStream::from_data(crypto, templates, Some(&parent)).await?;
    assert_eq!(rebuilt.to_hex(), REFERENCE_STREAM_HEX);
    Ok(())
}

#[tokio::test]
async fn truncated_stream_reports_field() -> Result<()> {
    let stream = BlockStream::from_hex(crypto(), "00")?;
    assert_eq!(
        stream.parse().unwrap_err(),
        ParseError::Field {
            field: "version",
            source: TlvError::MissingLength { offset: 1 },
        }
    );
    assert!(!stream.validate(None).await);
    Ok(())
}

#[tokio::test]
async fn derive_block_matches_reference() -> Result<()> {
    let crypto = crypto();
    let block = Block::from_hex(crypto.clone(), DERIVE_BLOCK_HEX)?;
    assert_eq!(block.hash().await.to_hex(), DERIVE_BLOCK_HASH);
    assert_eq!(block.human_readable()?, DERIVE_BLOCK_HUMAN);

    let parsed = block.parse()?;
    assert_eq!(parsed.version, 1);
    assert_eq!(parsed.commands.len(), 3);
    match parsed.commands[0].parse()? {
        CommandData::Derive(d) => assert_eq!(d.path, "m/0'/16'/1'"),
        other => panic!("expected Derive, got {other:?}"),
    }

    let data = BlockData {
        parent: parsed.parent.to_vec(),
        issuer: parsed.issuer.to_vec(),
        commands: parsed.commands.clone(),
        signature: parsed.signature.to_vec(),
    };
    let rebuilt = Block::from_data(crypto, &data)?;
    assert_eq!(rebuilt.to_hex(), DERIVE_BLOCK_HEX);
    Ok(())
}

#[tokio::test]
async fn member_blocks_form_a_stream_without_path() -> Result<()> {
    let hex = format!("{MEMBER_BLOCK_A_HEX}{MEMBER_BLOCK_B_HEX}");
    let stream = BlockStream::from_hex(crypto(), &hex)?;

    let blocks = stream.parse()?;
    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[0].hash().await.to_hex(), MEMBER_BLOCK_A_HASH);
    assert_eq!(blocks[1].parse()?.parent_hex(), MEMBER_BLOCK_A_HASH);
    assert_eq!(blocks[1].hash().await.to_hex(), MEMBER_BLOCK_B_HASH);

    assert!(stream.validate(None).await);
    assert_eq!(stream.path(), None);

    assert!(stream.has_member(MEMBER_80A289));
    assert!(stream.has_member(MEMBER_D4C61D));
    assert!(!stream.has_member(PUBLISHED_KEY_MEMBER));
    let owning = stream.member_block(MEMBER_D4C61D).unwrap();
    assert_eq!(owning.parent_hex(), MEMBER_BLOCK_A_HASH);
    assert_eq!(owning.commands.len(), 2);
    Ok(())
}

#[tokio::test]
async fn published_key_block_verifies_and_opens() -> Result<()> {
    let crypto = crypto();
    let block = Block::from_hex(crypto.clone(), PUBLISHED_KEY_BLOCK_HEX)?;
    assert_eq!(block.hash().await.to_hex(), PUBLISHED_KEY_BLOCK_HASH);
    assert_eq!(block.unsigned_bytes()?.len(), PUBLISHED_KEY_UNSIGNED_LEN);
    assert!(block.verify_signature().await?);

    let issuer = Secp256k1KeyPair::from_secret(&PUBLISHED_KEY_ISSUER_SECRET)?;
    assert_eq!(block.parse()?.issuer_hex(), issuer.public_key_hex());

    let stream = BlockStream::from_hex(crypto, PUBLISHED_KEY_BLOCK_HEX)?;
    let member = Secp256k1KeyPair::from_secret(&PUBLISHED_KEY_MEMBER_SECRET)?;
    let key = stream.published_key(&member).await?.unwrap();
    let xpriv = published_xpriv();
    assert_eq!(key.private_key, xpriv[..32].to_vec());
    assert_eq!(key.chain_code, xpriv[32..].to_vec());

    assert!(stream.published_key(&issuer).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn tampered_signature_fails_verification() -> Result<()> {
    let mut bytes = hex_bytes(PUBLISHED_KEY_BLOCK_HEX);
    let last = bytes.len() - 1;
    bytes[last] ^= 0x01;
    let block = Block::new(crypto(), bytes);
    assert!(!block.verify_signature().await?);
    assert_ne!(block.hash().await.to_hex(), PUBLISHED_KEY_BLOCK_HASH);
    Ok(())
}

#[tokio::test]
async fn trustchain_from_reference_response() -> Result<()> {
    let json = serde_json::json!({
        "m/": format!("{MEMBER_BLOCK_A_HEX}{MEMBER_BLOCK_B_HEX}"),
        "m/16'": REFERENCE_STREAM_HEX,
        "m/17'": PUBLISHED_KEY_BLOCK_HEX,
    })
    .to_string();
    let root_parent = lkrp::BlockHash::from_hex(REFERENCE_STREAM_PARENT)?;
    let config = TrustchainConfig::default().with_root_parent(root_parent);

    let tc = Trustchain::from_response(crypto(), "reference", &json, config).await?;
    assert_eq!(tc.paths().collect::<Vec<_>>(), vec!["m/", "m/16'", "m/17'"]);
    assert_eq!(tc.root_stream().unwrap().path(), None);
    assert_eq!(tc.app_stream(16).unwrap().path(), Some("m/0'/16'/0'"));

    let member = Secp256k1KeyPair::from_secret(&PUBLISHED_KEY_MEMBER_SECRET)?;
    let key = tc.published_key(17, &member).await?.unwrap();
    assert_eq!(key.chain_code, published_xpriv()[32..].to_vec());
    assert!(tc.published_key(16, &member).await?.is_none());

    let wrong_root = TrustchainConfig::default().with_root_parent(lkrp::BlockHash::ZERO);
    let err = Trustchain::from_response(crypto(), "reference", &json, wrong_root)
        .await
        .unwrap_err();
    assert!(matches!(err, KeyringError::InvalidStream { ref path } if path == "m/"));
    Ok(())
}

#[tokio::test]
async fn all_vectors_verify() {
    for (name, matches) in verify_all_vectors(crypto()).await {
        assert!(matches, "vector '{}' does not match", name);
    }
}
