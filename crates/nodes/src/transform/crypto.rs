//! Hashing, HMAC, symmetric encryption, and randomness.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use md5::Md5;
use rand::RngCore;
use serde_json::json;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};
use uuid::Uuid;
use weft_handler::{
    HandlerError, HandlerMetadata, NodeExecutionContext, NodeExecutionResult, NodeHandler,
};

/// Cryptographic utility operations behind one type key.
///
/// Operations: `hash`, `hmac`, `encrypt`, `decrypt`, `base64Encode`,
/// `base64Decode`, `random`, `uuid`. Encryption is AES-256-GCM with the
/// key derived by SHA-256 from the configured passphrase and a random
/// 12-byte nonce prepended to the ciphertext, the whole base64-wrapped.
pub struct Crypto {
    meta: HandlerMetadata,
}

impl Crypto {
    /// Create the handler singleton.
    #[must_use]
    pub fn new() -> Self {
        let schema = serde_json::json!({
            "type": "object",
            "x-multi-operation": true,
            "properties": {
                "operation": {
                    "type": "string",
                    "enum": [
                        "hash", "hmac", "encrypt", "decrypt",
                        "base64Encode", "base64Decode", "random", "uuid",
                    ],
                },
                "algorithm": {
                    "type": "string",
                    "enum": ["md5", "sha1", "sha256", "sha384", "sha512"],
                    "default": "sha256",
                },
                "encoding": {"type": "string", "enum": ["hex", "base64"], "default": "hex"},
                "data": {"type": "string", "description": "Input text; defaults to input.data"},
                "key": {"type": "string", "description": "HMAC / encryption key"},
                "byteCount": {"type": "integer", "default": 16},
            },
            "required": ["operation"],
        });
        Self {
            meta: HandlerMetadata::new("crypto", "Crypto", "Hash, sign, and encrypt data")
                .with_category("transform")
                .with_icon("lock")
                .with_config_schema(schema),
        }
    }

    fn data_arg(ctx: &NodeExecutionContext) -> String {
        ctx.config_str("data")
            .map(ToOwned::to_owned)
            .or_else(|| {
                ctx.input()
                    .get("data")
                    .map(weft_core::value::coerce_string)
            })
            .unwrap_or_default()
    }

    fn encode(bytes: &[u8], encoding: &str) -> String {
        match encoding {
            "base64" => BASE64.encode(bytes),
            _ => hex::encode(bytes),
        }
    }

    fn hash_bytes(algorithm: &str, data: &[u8]) -> Result<Vec<u8>, HandlerError> {
        let digest = match algorithm {
            "md5" => Md5::digest(data).to_vec(),
            "sha1" => Sha1::digest(data).to_vec(),
            "sha256" => Sha256::digest(data).to_vec(),
            "sha384" => Sha384::digest(data).to_vec(),
            "sha512" => Sha512::digest(data).to_vec(),
            other => {
                return Err(HandlerError::validation(format!(
                    "unsupported hash algorithm `{other}`"
                )))
            }
        };
        Ok(digest)
    }

    fn hmac_bytes(algorithm: &str, key: &[u8], data: &[u8]) -> Result<Vec<u8>, HandlerError> {
        macro_rules! compute {
            ($digest:ty) => {{
                let mut mac = <Hmac<$digest> as Mac>::new_from_slice(key)
                    .map_err(|_| HandlerError::internal("hmac key setup failed"))?;
                mac.update(data);
                Ok(mac.finalize().into_bytes().to_vec())
            }};
        }

        match algorithm {
            "sha1" => compute!(Sha1),
            "sha256" => compute!(Sha256),
            "sha384" => compute!(Sha384),
            "sha512" => compute!(Sha512),
            other => Err(HandlerError::validation(format!(
                "unsupported hmac algorithm `{other}`"
            ))),
        }
    }

    fn cipher_for(key: &str) -> Aes256Gcm {
        // Derive a 32-byte key from the passphrase.
        let key_bytes = Sha256::digest(key.as_bytes());
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key_bytes))
    }

    fn encrypt(key: &str, plaintext: &str) -> Result<String, HandlerError> {
        let cipher = Self::cipher_for(key);
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| HandlerError::internal("encryption failed"))?;

        let mut wrapped = nonce.to_vec();
        wrapped.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(wrapped))
    }

    fn decrypt(key: &str, wrapped: &str) -> Result<String, HandlerError> {
        let bytes = BASE64
            .decode(wrapped)
            .map_err(|err| HandlerError::validation(format!("invalid ciphertext: {err}")))?;
        if bytes.len() < 12 {
            return Err(HandlerError::validation("ciphertext too short"));
        }
        let (nonce, ciphertext) = bytes.split_at(12);
        let cipher = Self::cipher_for(key);
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| HandlerError::security("decryption failed: wrong key or tampered data"))?;
        String::from_utf8(plaintext)
            .map_err(|_| HandlerError::internal("decrypted data is not valid UTF-8"))
    }
}

impl Default for Crypto {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeHandler for Crypto {
    fn metadata(&self) -> &HandlerMetadata {
        &self.meta
    }

    async fn execute(
        &self,
        ctx: &NodeExecutionContext,
    ) -> Result<NodeExecutionResult, HandlerError> {
        let operation = ctx
            .config_str("operation")
            .ok_or_else(|| HandlerError::validation("missing required field `operation`"))?;
        let algorithm = ctx.config_str("algorithm").unwrap_or("sha256");
        let encoding = ctx.config_str("encoding").unwrap_or("hex");
        let data = Self::data_arg(ctx);

        let output = match operation {
            "hash" => {
                let digest = Self::hash_bytes(algorithm, data.as_bytes())?;
                json!({"result": Self::encode(&digest, encoding), "algorithm": algorithm})
            }
            "hmac" => {
                let key = ctx
                    .config_str("key")
                    .ok_or_else(|| HandlerError::validation("hmac requires `key`"))?;
                let digest = Self::hmac_bytes(algorithm, key.as_bytes(), data.as_bytes())?;
                json!({"result": Self::encode(&digest, encoding), "algorithm": algorithm})
            }
            "encrypt" => {
                let key = ctx
                    .config_str("key")
                    .ok_or_else(|| HandlerError::validation("encrypt requires `key`"))?;
                json!({"result": Self::encrypt(key, &data)?})
            }
            "decrypt" => {
                let key = ctx
                    .config_str("key")
                    .ok_or_else(|| HandlerError::validation("decrypt requires `key`"))?;
                json!({"result": Self::decrypt(key, &data)?})
            }
            "base64Encode" => json!({"result": BASE64.encode(data.as_bytes())}),
            "base64Decode" => {
                let bytes = BASE64
                    .decode(data.trim())
                    .map_err(|err| HandlerError::validation(format!("invalid base64: {err}")))?;
                let text = String::from_utf8(bytes)
                    .map_err(|_| HandlerError::validation("decoded data is not valid UTF-8"))?;
                json!({"result": text})
            }
            "random" => {
                let count = ctx.config_u64("byteCount", 16).min(1024) as usize;
                let mut bytes = vec![0u8; count];
                rand::thread_rng().fill_bytes(&mut bytes);
                json!({"result": hex::encode(bytes), "bytes": count})
            }
            "uuid" => json!({"result": Uuid::new_v4().to_string()}),
            other => {
                return Err(HandlerError::validation(format!(
                    "unknown operation `{other}`"
                )))
            }
        };

        Ok(NodeExecutionResult::success(output))
    }
}
