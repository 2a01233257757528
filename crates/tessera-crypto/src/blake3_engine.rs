//! Reference [`CryptoEngine`] built from BLAKE3 commitments and Ed25519.
//!
//! - `g[0]` of the issuer parameters is the issuer's Ed25519 verifying key;
//!   the remaining generators are derived by hashing and only published.
//! - A token carries one salted commitment `H(attribute || salt)` per
//!   attribute, signed by the issuer. Salts are derived from the token key,
//!   so the token private key alone opens every commitment.
//! - Presentations open disclosed commitments and are signed with the token
//!   key; device-protected tokens additionally need a device signature.
//! - Range and set-membership proofs are Fiat-Shamir bound hash proofs over
//!   the closed commitment of the referenced attribute.
//!
//! This engine is meant for testing and reference deployments. It does not
//! give the unlinkability of a group-based engine.

use chrono::NaiveDate;
use rand::RngCore;
use serde_json::Value;
use tessera_core::config::MAX_ATTRIBUTES_CAP;
use tessera_core::encoding::{decode_date_value, year_and_day, FLAG_DIRECT};
use tessera_core::wire::{
    EnginePayload, FirstIssuanceMessage, GroupDescription, IssuerParameters, KeyAndToken,
    PresentationProof, ProofRequirements, SecondIssuanceMessage, ThirdIssuanceMessage, Token,
};
use tessera_core::{GroupConstruction, IssuerSetupConfig};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::engine::{
    CryptoEngine, IssuanceRequest, IssuerKeyAndParameters, MembershipClaim, PresentationRequest,
    ProverRequest, RangeClaim,
};
use crate::error::CryptoError;
use crate::hashing::{self, Hash};
use crate::keys::{KeyPair, PublicKey};
use crate::payload;
use crate::signing::{self, verify_raw};
use crate::zkp::{Blake3ProofGenerator, RangeProof, RangeStatement, SetMembershipProof};

/// Hash algorithm identifier published in `uidh`.
pub const HASH_ALGORITHM: &str = "BLAKE3";

/// Largest directly encoded attribute value.
pub const MAX_DIRECT_ATTRIBUTE_LEN: usize = 31;

const DEVICE_SUPPORT_KEY: &str = "isDeviceSupported";
const SIGNATURE_KEY: &str = "signature";

const GENERATOR_DOMAIN: &str = "tessera 2024 issuer generator";
const PARAMETERS_DOMAIN: &str = "tessera 2024 issuer parameters";
const SALT_DOMAIN: &str = "tessera 2024 attribute salt";
const TOKEN_DOMAIN: &str = "tessera 2024 token body";
const PRESENTATION_DOMAIN: &str = "tessera 2024 presentation transcript";
const DEVICE_DOMAIN: &str = "tessera 2024 device presentation";
const PSEUDONYM_DOMAIN: &str = "tessera 2024 scope pseudonym";

/// Issuer state between the first and the third message.
#[derive(Debug)]
pub struct IssuanceSecret {
    attributes: Vec<Vec<u8>>,
    token_information: Vec<u8>,
    device_public_key: Option<Vec<u8>>,
    nonces: Vec<Hash>,
}

/// Prover state between the second message and token generation.
#[derive(Debug)]
pub struct ProverSecret {
    attributes: Vec<Vec<u8>>,
    token_information: Vec<u8>,
    pi_digest: Hash,
    device_public_key: Option<Vec<u8>>,
    token_keys: Vec<KeyPair>,
}

/// Opening of one committed attribute.
#[derive(Debug, Clone, Zeroize, ZeroizeOnDrop)]
pub struct Opening {
    /// 1-based attribute index.
    pub index: usize,
    pub value: Vec<u8>,
    pub salt: Hash,
    pub commitment: Hash,
}

/// Openings of a presentation's committed attributes, in committed order.
#[derive(Debug, Clone, Default)]
pub struct CommitmentOpenings {
    pub openings: Vec<Opening>,
    /// Digest of the presentation transcript the openings belong to.
    pub transcript: Hash,
}

/// Reference engine. Stateless; share freely.
#[derive(Debug, Clone, Copy, Default)]
pub struct Blake3Engine;

impl Blake3Engine {
    pub fn new() -> Self {
        Self
    }
}

struct ParsedToken {
    uidp: Vec<u8>,
    h: Vec<u8>,
    ti: Vec<u8>,
    pi_digest: Hash,
    commitments: Vec<Hash>,
    sigma: Vec<u8>,
    device_public_key: Option<Vec<u8>>,
}

impl ParsedToken {
    fn parse(token: &Token) -> Result<Self, CryptoError> {
        let p = &token.0;
        Ok(Self {
            uidp: payload::bytes(p, "uidp")?,
            h: payload::bytes(p, "h")?,
            ti: payload::bytes(p, "ti")?,
            pi_digest: payload::hash(p, "piDigest")?,
            commitments: payload::hash_list(p, "commitments")?,
            sigma: payload::bytes(p, "sigma")?,
            device_public_key: payload::optional_bytes(p, "devicePublicKey")?,
        })
    }

    fn digest(&self) -> Hash {
        token_digest(
            &self.uidp,
            &self.h,
            &self.ti,
            &self.pi_digest,
            &self.commitments,
            self.device_public_key.as_deref(),
        )
    }

    /// Issued by the holder of `parameters`.
    fn verify_issuer(&self, parameters: &IssuerParameters) -> Result<(), CryptoError> {
        if self.uidp != parameters.uidp {
            return Err(CryptoError::InvalidInput(
                "token was not issued under these issuer parameters".into(),
            ));
        }
        verify_raw(&self.digest(), &self.sigma, issuer_public_key(parameters)?)
    }

    fn commitment_at(&self, index: usize) -> Result<&Hash, CryptoError> {
        index
            .checked_sub(1)
            .and_then(|i| self.commitments.get(i))
            .ok_or_else(|| CryptoError::InvalidInput(format!("no commitment for index {}", index)))
    }
}

fn issuer_public_key(parameters: &IssuerParameters) -> Result<&[u8], CryptoError> {
    parameters
        .g
        .first()
        .map(Vec::as_slice)
        .ok_or_else(|| CryptoError::InvalidParameters("missing generator g0".into()))
}

fn issuer_keypair(issuer: &IssuerKeyAndParameters) -> Result<KeyPair, CryptoError> {
    KeyPair::from_bytes(&issuer.private_key)
}

fn random_hash() -> Hash {
    let mut out = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut out);
    out
}

fn parameters_digest(parameters: &IssuerParameters) -> Hash {
    let max = (parameters.max_number_of_attributes as u64).to_le_bytes();
    let device = [u8::from(payload::bool_field(
        &parameters.extensions,
        DEVICE_SUPPORT_KEY,
    ))];
    let mut parts: Vec<&[u8]> = vec![
        parameters.uidp.as_slice(),
        parameters.uidh.as_bytes(),
        parameters.desc_gq.name.as_bytes(),
        parameters.desc_gq.kind.as_bytes(),
        parameters.e.as_slice(),
        parameters.s.as_slice(),
        max.as_slice(),
        device.as_slice(),
    ];
    parts.extend(parameters.g.iter().map(Vec::as_slice));
    hashing::hash_parts(PARAMETERS_DOMAIN, &parts)
}

fn sign_parameters(parameters: &mut IssuerParameters, issuer: &KeyPair) {
    parameters.extensions.remove(SIGNATURE_KEY);
    let signature = signing::sign(&parameters_digest(parameters), issuer);
    parameters
        .extensions
        .insert(SIGNATURE_KEY.into(), payload::encode(&signature.to_bytes()));
}

fn derive_salts(token_seed: &[u8], count: usize) -> Vec<Hash> {
    (0..count as u64)
        .map(|i| hashing::hash_parts(SALT_DOMAIN, &[token_seed, i.to_le_bytes().as_slice()]))
        .collect()
}

fn token_digest(
    uidp: &[u8],
    h: &[u8],
    ti: &[u8],
    pi_digest: &Hash,
    commitments: &[Hash],
    device_public_key: Option<&[u8]>,
) -> Hash {
    let mut parts: Vec<&[u8]> = vec![uidp, h, ti, pi_digest.as_slice()];
    parts.extend(commitments.iter().map(|c| c.as_slice()));
    parts.push(device_public_key.unwrap_or_default());
    hashing::hash_parts(TOKEN_DOMAIN, &parts)
}

fn pseudonym(scope: &[u8], commitment: &Hash) -> Hash {
    hashing::hash_parts(PSEUDONYM_DOMAIN, &[scope, commitment.as_slice()])
}

fn index_bytes(indices: &[usize]) -> Vec<u8> {
    indices
        .iter()
        .flat_map(|i| (*i as u64).to_le_bytes())
        .collect()
}

fn presentation_digest(
    uidp: &[u8],
    h: &[u8],
    requirements: &ProofRequirements,
    disclosed: &[Vec<u8>],
    openings: &[Hash],
    pseudonym: Option<&Hash>,
) -> Hash {
    let disclosed_indices = index_bytes(&requirements.disclosed_attributes);
    let committed_indices = index_bytes(&requirements.committed_attributes);
    let mut parts: Vec<&[u8]> = vec![
        uidp,
        h,
        requirements.message.as_slice(),
        requirements.scope.as_deref().unwrap_or_default(),
        requirements.device_message.as_deref().unwrap_or_default(),
        disclosed_indices.as_slice(),
        committed_indices.as_slice(),
    ];
    parts.extend(disclosed.iter().map(Vec::as_slice));
    parts.extend(openings.iter().map(|o| o.as_slice()));
    parts.push(pseudonym.map(|p| p.as_slice()).unwrap_or_default());
    hashing::hash_parts(PRESENTATION_DOMAIN, &parts)
}

/// Transcript digest of a presentation proof whose signature was checked.
fn proof_transcript(
    parameters: &IssuerParameters,
    token: &ParsedToken,
    proof: &PresentationProof,
) -> Result<Hash, CryptoError> {
    let requirements = &proof.requirements;
    let openings = payload::hash_list(&proof.payload, "r")?;
    let ps = match (requirements.pseudonym_attribute_index(), &requirements.scope) {
        (0, _) | (_, None) => None,
        _ => Some(payload::hash(&proof.payload, "ps")?),
    };
    Ok(presentation_digest(
        &parameters.uidp,
        &token.h,
        requirements,
        &proof.disclosed_values,
        &openings,
        ps.as_ref(),
    ))
}

fn device_digest(transcript: &Hash, device_message: Option<&[u8]>) -> Hash {
    hashing::hash_parts(
        DEVICE_DOMAIN,
        &[transcript.as_slice(), device_message.unwrap_or_default()],
    )
}

/// Indices are 1-based, in range, unique, and never both disclosed and committed.
fn validate_indices(requirements: &ProofRequirements, count: usize) -> Result<(), CryptoError> {
    let mut seen = vec![false; count];
    for index in requirements
        .disclosed_attributes
        .iter()
        .chain(requirements.committed_attributes.iter())
    {
        if *index == 0 || *index > count {
            return Err(CryptoError::InvalidInput(format!(
                "attribute index {} out of range 1..={}",
                index, count
            )));
        }
        if std::mem::replace(&mut seen[index - 1], true) {
            return Err(CryptoError::InvalidInput(format!(
                "attribute index {} listed twice",
                index
            )));
        }
    }
    Ok(())
}

fn validate_attributes(
    parameters: &IssuerParameters,
    attributes: &[Vec<u8>],
) -> Result<(), CryptoError> {
    if attributes.len() > parameters.max_number_of_attributes {
        return Err(CryptoError::InvalidInput(format!(
            "{} attributes exceed the issuer maximum of {}",
            attributes.len(),
            parameters.max_number_of_attributes
        )));
    }
    if parameters.e.is_empty() {
        return Ok(());
    }
    if parameters.e.len() != attributes.len() {
        return Err(CryptoError::InvalidInput(format!(
            "issuer encodes {} attributes, got {}",
            parameters.e.len(),
            attributes.len()
        )));
    }
    for (i, (flag, value)) in parameters.e.iter().zip(attributes).enumerate() {
        if *flag == FLAG_DIRECT && value.len() > MAX_DIRECT_ATTRIBUTE_LEN {
            return Err(CryptoError::InvalidInput(format!(
                "directly encoded attribute {} is {} bytes, at most {} allowed",
                i + 1,
                value.len(),
                MAX_DIRECT_ATTRIBUTE_LEN
            )));
        }
    }
    Ok(())
}

fn validate_device_key(
    parameters: &IssuerParameters,
    device_public_key: Option<&[u8]>,
) -> Result<(), CryptoError> {
    let protected = payload::bool_field(&parameters.extensions, DEVICE_SUPPORT_KEY);
    match device_public_key {
        None if protected => Err(CryptoError::InvalidInput(
            "issuer is device protected, a device public key is required".into(),
        )),
        Some(_) if !protected => Err(CryptoError::InvalidInput(
            "issuer does not support device protection".into(),
        )),
        Some(key) => PublicKey::from_bytes(key).map(|_| ()),
        None => Ok(()),
    }
}

fn range_statement(claim: &RangeClaim) -> Result<RangeStatement, CryptoError> {
    let to_input = |e: tessera_core::ProtocolError| CryptoError::InvalidInput(e.to_string());
    let last_day = NaiveDate::from_ymd_opt(claim.max_year, 12, 31)
        .ok_or_else(|| CryptoError::InvalidInput(format!("invalid year {}", claim.max_year)))?;
    Ok(RangeStatement {
        operator: claim.operator,
        target: year_and_day(claim.target_date, claim.min_year).map_err(to_input)?,
        min: 0,
        max: year_and_day(last_day, claim.min_year).map_err(to_input)?,
    })
}

fn committed_commitment<'a>(
    token: &'a ParsedToken,
    requirements: &ProofRequirements,
    position: usize,
) -> Result<&'a Hash, CryptoError> {
    let index = requirements
        .committed_attributes
        .get(position)
        .ok_or_else(|| {
            CryptoError::InvalidInput(format!("no committed attribute at position {}", position))
        })?;
    token.commitment_at(*index)
}

impl CryptoEngine for Blake3Engine {
    type IssuanceSecret = IssuanceSecret;
    type ProverSecret = ProverSecret;
    type CommitmentSecrets = CommitmentOpenings;
    type DeviceContext = KeyPair;

    fn setup_issuer(
        &self,
        config: &IssuerSetupConfig,
    ) -> Result<IssuerKeyAndParameters, CryptoError> {
        config
            .validate()
            .map_err(|e| CryptoError::InvalidParameters(e.to_string()))?;

        let issuer = KeyPair::generate();
        let uidp = config.uidp.as_bytes().to_vec();
        let mut g = vec![issuer.public_key().as_bytes().to_vec()];
        g.extend((1..=config.max_number_of_attributes as u64).map(|i| {
            hashing::hash_parts(GENERATOR_DOMAIN, &[uidp.as_slice(), i.to_le_bytes().as_slice()])
                .to_vec()
        }));

        let mut extensions = EnginePayload::new();
        extensions.insert(
            DEVICE_SUPPORT_KEY.into(),
            Value::Bool(config.device_protected),
        );

        let mut parameters = IssuerParameters {
            uidp,
            uidh: HASH_ALGORITHM.into(),
            desc_gq: GroupDescription {
                name: config.group.group_name().into(),
                kind: config.group.group_type().into(),
            },
            g,
            e: Vec::new(),
            s: config.specification.as_bytes().to_vec(),
            max_number_of_attributes: config.max_number_of_attributes,
            extensions,
        };
        sign_parameters(&mut parameters, &issuer);

        tracing::info!(
            uidp = %config.uidp,
            group = %config.group,
            max_attributes = config.max_number_of_attributes,
            device_protected = config.device_protected,
            "issuer key generated"
        );

        let mut seed = issuer.secret_bytes();
        let private_key = Zeroizing::new(seed.to_vec());
        seed.zeroize();
        Ok(IssuerKeyAndParameters {
            parameters,
            private_key,
        })
    }

    fn load_issuer(
        &self,
        parameters: IssuerParameters,
        private_key: &[u8],
    ) -> Result<IssuerKeyAndParameters, CryptoError> {
        self.verify_issuer_parameters(&parameters)?;
        let issuer = KeyPair::from_bytes(private_key)?;
        if issuer.public_key().as_bytes().as_slice() != issuer_public_key(&parameters)? {
            return Err(CryptoError::InvalidParameters(
                "private key does not match the issuer parameters".into(),
            ));
        }
        Ok(IssuerKeyAndParameters {
            parameters,
            private_key: Zeroizing::new(private_key.to_vec()),
        })
    }

    fn verify_issuer_parameters(&self, parameters: &IssuerParameters) -> Result<(), CryptoError> {
        let max = parameters.max_number_of_attributes;
        if max == 0 || max > MAX_ATTRIBUTES_CAP {
            return Err(CryptoError::InvalidParameters(format!(
                "MaxNumberOfAttributes {} outside 1..={}",
                max, MAX_ATTRIBUTES_CAP
            )));
        }
        if parameters.g.len() != max + 1 {
            return Err(CryptoError::InvalidParameters(format!(
                "expected {} generators, got {}",
                max + 1,
                parameters.g.len()
            )));
        }
        if parameters.uidh != HASH_ALGORITHM {
            return Err(CryptoError::InvalidParameters(format!(
                "unsupported hash algorithm '{}'",
                parameters.uidh
            )));
        }
        if GroupConstruction::from_group_name(&parameters.desc_gq.name).is_none() {
            return Err(CryptoError::InvalidParameters(format!(
                "unknown group '{}'",
                parameters.desc_gq.name
            )));
        }
        if parameters.e.len() > max || parameters.e.iter().any(|f| *f > 1) {
            return Err(CryptoError::InvalidParameters("invalid encoding flags".into()));
        }
        let signature = payload::bytes(&parameters.extensions, SIGNATURE_KEY)?;
        verify_raw(
            &parameters_digest(parameters),
            &signature,
            issuer_public_key(parameters)?,
        )
    }

    fn rebuild_issuer_parameters(
        &self,
        issuer: &IssuerKeyAndParameters,
        encoding_flags: &[u8],
    ) -> Result<IssuerKeyAndParameters, CryptoError> {
        if encoding_flags.len() > issuer.parameters.max_number_of_attributes {
            return Err(CryptoError::InvalidParameters(format!(
                "{} encoding flags exceed MaxNumberOfAttributes {}",
                encoding_flags.len(),
                issuer.parameters.max_number_of_attributes
            )));
        }
        let keypair = issuer_keypair(issuer)?;
        let mut parameters = issuer.parameters.clone();
        parameters.e = encoding_flags.to_vec();
        sign_parameters(&mut parameters, &keypair);
        Ok(IssuerKeyAndParameters {
            parameters,
            private_key: issuer.private_key.clone(),
        })
    }

    fn is_device_protected(&self, parameters: &IssuerParameters) -> bool {
        payload::bool_field(&parameters.extensions, DEVICE_SUPPORT_KEY)
    }

    fn issuer_first_message(
        &self,
        issuer: &IssuerKeyAndParameters,
        request: &IssuanceRequest,
    ) -> Result<(FirstIssuanceMessage, IssuanceSecret), CryptoError> {
        if request.token_count == 0 {
            return Err(CryptoError::InvalidInput("token count must be positive".into()));
        }
        validate_attributes(&issuer.parameters, &request.attributes)?;
        validate_device_key(&issuer.parameters, request.device_public_key.as_deref())?;

        let nonces: Vec<Hash> = (0..request.token_count).map(|_| random_hash()).collect();

        let mut message = EnginePayload::new();
        message.insert(
            "attributeCount".into(),
            Value::from(request.attributes.len()),
        );
        message.insert("tokenCount".into(), Value::from(request.token_count));
        message.insert("nonces".into(), payload::encode_list(&nonces));

        tracing::debug!(tokens = request.token_count, "first issuance message computed");

        Ok((
            FirstIssuanceMessage(message),
            IssuanceSecret {
                attributes: request.attributes.clone(),
                token_information: request.token_information.clone(),
                device_public_key: request.device_public_key.clone(),
                nonces,
            },
        ))
    }

    fn issuer_third_message(
        &self,
        issuer: &IssuerKeyAndParameters,
        secret: &IssuanceSecret,
        second: &SecondIssuanceMessage,
    ) -> Result<ThirdIssuanceMessage, CryptoError> {
        let keypair = issuer_keypair(issuer)?;
        let pi_digest = payload::hash(&second.0, "piDigest")?;
        let entries = payload::object_list(&second.0, "tokens")?;
        if entries.len() != secret.nonces.len() {
            return Err(CryptoError::InvalidInput(format!(
                "second message carries {} tokens, {} were offered",
                entries.len(),
                secret.nonces.len()
            )));
        }

        let mut signatures = Vec::with_capacity(entries.len());
        for (entry, nonce) in entries.into_iter().zip(&secret.nonces) {
            if payload::hash(entry, "nonce")? != *nonce {
                return Err(CryptoError::InvalidInput(
                    "second message does not answer this first message".into(),
                ));
            }
            let h = payload::bytes(entry, "h")?;
            PublicKey::from_bytes(&h)?;
            let salts = payload::hash_list(entry, "salts")?;
            if salts.len() != secret.attributes.len() {
                return Err(CryptoError::InvalidInput(format!(
                    "expected {} salts, got {}",
                    secret.attributes.len(),
                    salts.len()
                )));
            }
            let commitments: Vec<Hash> = secret
                .attributes
                .iter()
                .zip(&salts)
                .map(|(value, salt)| hashing::create_commitment(value, salt))
                .collect();
            let digest = token_digest(
                &issuer.parameters.uidp,
                &h,
                &secret.token_information,
                &pi_digest,
                &commitments,
                secret.device_public_key.as_deref(),
            );
            signatures.push(signing::sign(&digest, &keypair).to_bytes());
        }

        let mut message = EnginePayload::new();
        message.insert("signatures".into(), payload::encode_list(&signatures));
        tracing::debug!(tokens = signatures.len(), "third issuance message computed");
        Ok(ThirdIssuanceMessage(message))
    }

    fn prover_second_message(
        &self,
        parameters: &IssuerParameters,
        request: &ProverRequest,
        first: &FirstIssuanceMessage,
    ) -> Result<(SecondIssuanceMessage, ProverSecret), CryptoError> {
        validate_attributes(parameters, &request.attributes)?;
        validate_device_key(parameters, request.device_public_key.as_deref())?;

        let attribute_count = payload::usize_field(&first.0, "attributeCount")?;
        if attribute_count != request.attributes.len() {
            return Err(CryptoError::InvalidInput(format!(
                "issuer encoded {} attributes, prover holds {}",
                attribute_count,
                request.attributes.len()
            )));
        }
        let nonces = payload::hash_list(&first.0, "nonces")?;
        if nonces.len() != request.token_count {
            return Err(CryptoError::InvalidInput(format!(
                "issuer offered {} tokens, prover requested {}",
                nonces.len(),
                request.token_count
            )));
        }

        let pi_digest = hashing::hash(&request.prover_information);
        let mut token_keys = Vec::with_capacity(nonces.len());
        let mut entries = Vec::with_capacity(nonces.len());
        for nonce in &nonces {
            let key = KeyPair::generate();
            let mut seed = key.secret_bytes();
            let salts = derive_salts(&seed, request.attributes.len());
            seed.zeroize();

            let mut entry = EnginePayload::new();
            entry.insert("h".into(), payload::encode(key.public_key().as_bytes()));
            entry.insert("nonce".into(), payload::encode(nonce));
            entry.insert("salts".into(), payload::encode_list(&salts));
            entries.push(Value::Object(entry));
            token_keys.push(key);
        }

        let mut message = EnginePayload::new();
        message.insert("tokens".into(), Value::Array(entries));
        message.insert("piDigest".into(), payload::encode(&pi_digest));

        tracing::debug!(tokens = token_keys.len(), "second issuance message computed");

        Ok((
            SecondIssuanceMessage(message),
            ProverSecret {
                attributes: request.attributes.clone(),
                token_information: request.token_information.clone(),
                pi_digest,
                device_public_key: request.device_public_key.clone(),
                token_keys,
            },
        ))
    }

    fn prover_generate_tokens(
        &self,
        parameters: &IssuerParameters,
        secret: &ProverSecret,
        third: &ThirdIssuanceMessage,
        skip_device_validation: bool,
    ) -> Result<Vec<KeyAndToken>, CryptoError> {
        let signatures = payload::bytes_list(&third.0, "signatures")?;
        if signatures.len() != secret.token_keys.len() {
            return Err(CryptoError::InvalidInput(format!(
                "third message carries {} signatures for {} tokens",
                signatures.len(),
                secret.token_keys.len()
            )));
        }
        if let (Some(device), false) = (&secret.device_public_key, skip_device_validation) {
            PublicKey::from_bytes(device)?;
        }

        let issuer_key = issuer_public_key(parameters)?;
        let mut tokens = Vec::with_capacity(signatures.len());
        for (key, sigma) in secret.token_keys.iter().zip(signatures) {
            let seed = Zeroizing::new(key.secret_bytes());
            let salts = derive_salts(seed.as_slice(), secret.attributes.len());
            let commitments: Vec<Hash> = secret
                .attributes
                .iter()
                .zip(&salts)
                .map(|(value, salt)| hashing::create_commitment(value, salt))
                .collect();
            let h = key.public_key().as_bytes().to_vec();
            let digest = token_digest(
                &parameters.uidp,
                &h,
                &secret.token_information,
                &secret.pi_digest,
                &commitments,
                secret.device_public_key.as_deref(),
            );
            verify_raw(&digest, &sigma, issuer_key)?;

            let mut token = EnginePayload::new();
            token.insert("uidp".into(), payload::encode(&parameters.uidp));
            token.insert("h".into(), payload::encode(&h));
            token.insert("ti".into(), payload::encode(&secret.token_information));
            token.insert("piDigest".into(), payload::encode(&secret.pi_digest));
            token.insert("commitments".into(), payload::encode_list(&commitments));
            token.insert("sigma".into(), payload::encode(&sigma));
            token.insert(
                "isDeviceProtected".into(),
                Value::Bool(secret.device_public_key.is_some()),
            );
            if let Some(device) = &secret.device_public_key {
                token.insert("devicePublicKey".into(), payload::encode(device));
            }

            tokens.push(KeyAndToken {
                key: seed.to_vec(),
                token: Token(token),
            });
        }

        tracing::debug!(tokens = tokens.len(), "tokens verified against issuer key");
        Ok(tokens)
    }

    fn presentation_proof_generate(
        &self,
        parameters: &IssuerParameters,
        request: &PresentationRequest,
        key_and_token: &KeyAndToken,
        device: Option<&KeyPair>,
    ) -> Result<(PresentationProof, CommitmentOpenings), CryptoError> {
        let token = ParsedToken::parse(&key_and_token.token)?;
        if token.uidp != parameters.uidp {
            return Err(CryptoError::InvalidInput(
                "token was not issued under these issuer parameters".into(),
            ));
        }
        let token_key = KeyPair::from_bytes(&key_and_token.key)?;
        if token_key.public_key().as_bytes().as_slice() != token.h.as_slice() {
            return Err(CryptoError::InvalidInput(
                "private key does not belong to this token".into(),
            ));
        }

        let attributes = &request.attributes;
        let requirements = &request.requirements;
        if attributes.len() != token.commitments.len() {
            return Err(CryptoError::InvalidInput(format!(
                "token commits to {} attributes, {} supplied",
                token.commitments.len(),
                attributes.len()
            )));
        }
        validate_indices(requirements, attributes.len())?;

        let salts = derive_salts(&key_and_token.key, attributes.len());
        for (i, (value, salt)) in attributes.iter().zip(&salts).enumerate() {
            if !hashing::verify_commitment(value, salt, &token.commitments[i]) {
                return Err(CryptoError::InvalidInput(format!(
                    "attribute {} does not match the token",
                    i + 1
                )));
            }
        }

        let disclosed: Vec<Vec<u8>> = requirements
            .disclosed_attributes
            .iter()
            .map(|i| attributes[i - 1].clone())
            .collect();
        let openings: Vec<Hash> = requirements
            .disclosed_attributes
            .iter()
            .map(|i| salts[i - 1])
            .collect();
        let ps = match (requirements.pseudonym_attribute_index(), &requirements.scope) {
            (0, _) | (_, None) => None,
            (index, Some(scope)) => Some(pseudonym(scope, token.commitment_at(index)?)),
        };

        let transcript = presentation_digest(
            &parameters.uidp,
            &token.h,
            requirements,
            &disclosed,
            &openings,
            ps.as_ref(),
        );

        let mut proof_payload = EnginePayload::new();
        proof_payload.insert("r".into(), payload::encode_list(&openings));
        proof_payload.insert(
            "a".into(),
            payload::encode(&signing::sign(&transcript, &token_key).to_bytes()),
        );
        if let Some(ps) = &ps {
            proof_payload.insert("ps".into(), payload::encode(ps));
        }
        if let Some(device_key) = &token.device_public_key {
            let device = device.ok_or_else(|| {
                CryptoError::InvalidInput("token is device protected, device required".into())
            })?;
            if device.public_key().as_bytes().as_slice() != device_key.as_slice() {
                return Err(CryptoError::InvalidInput(
                    "device does not hold the token's device key".into(),
                ));
            }
            let digest = device_digest(&transcript, requirements.device_message.as_deref());
            proof_payload.insert(
                "dsig".into(),
                payload::encode(&signing::sign(&digest, device).to_bytes()),
            );
        }

        let secrets = CommitmentOpenings {
            openings: requirements
                .committed_attributes
                .iter()
                .map(|i| Opening {
                    index: *i,
                    value: attributes[i - 1].clone(),
                    salt: salts[i - 1],
                    commitment: token.commitments[i - 1],
                })
                .collect(),
            transcript,
        };

        tracing::debug!(
            disclosed = requirements.disclosed_attributes.len(),
            committed = requirements.committed_attributes.len(),
            pseudonym = ps.is_some(),
            "presentation proof computed"
        );

        Ok((
            PresentationProof {
                disclosed_values: disclosed,
                requirements: requirements.clone(),
                payload: proof_payload,
            },
            secrets,
        ))
    }

    fn presentation_proof_verify(
        &self,
        parameters: &IssuerParameters,
        proof: &PresentationProof,
        token: &Token,
    ) -> Result<(), CryptoError> {
        let token = ParsedToken::parse(token)?;
        token.verify_issuer(parameters)?;

        let requirements = &proof.requirements;
        validate_indices(requirements, token.commitments.len())?;
        let disclosed_count = requirements.disclosed_attributes.len();
        let openings = payload::hash_list(&proof.payload, "r")?;
        if proof.disclosed_values.len() != disclosed_count || openings.len() != disclosed_count {
            return Err(CryptoError::ZkpError(
                "disclosed values do not match the disclosed indices".into(),
            ));
        }
        for ((index, value), salt) in requirements
            .disclosed_attributes
            .iter()
            .zip(&proof.disclosed_values)
            .zip(&openings)
        {
            if !hashing::verify_commitment(value, salt, token.commitment_at(*index)?) {
                return Err(CryptoError::ZkpError(format!(
                    "disclosed attribute {} does not open its commitment",
                    index
                )));
            }
        }

        let ps = match (requirements.pseudonym_attribute_index(), &requirements.scope) {
            (0, _) | (_, None) => None,
            (index, Some(scope)) => {
                let expected = pseudonym(scope, token.commitment_at(index)?);
                if payload::hash(&proof.payload, "ps")? != expected {
                    return Err(CryptoError::ZkpError("scope pseudonym mismatch".into()));
                }
                Some(expected)
            }
        };

        let transcript = presentation_digest(
            &parameters.uidp,
            &token.h,
            requirements,
            &proof.disclosed_values,
            &openings,
            ps.as_ref(),
        );
        verify_raw(&transcript, &payload::bytes(&proof.payload, "a")?, &token.h)?;

        if let Some(device_key) = &token.device_public_key {
            let digest = device_digest(&transcript, requirements.device_message.as_deref());
            let dsig = payload::bytes(&proof.payload, "dsig")?;
            verify_raw(&digest, &dsig, device_key)?;
        }
        Ok(())
    }

    fn range_proof_generate(
        &self,
        _parameters: &IssuerParameters,
        proof: &PresentationProof,
        secrets: &CommitmentOpenings,
        claim: &RangeClaim,
    ) -> Result<EnginePayload, CryptoError> {
        let opening = secrets
            .openings
            .get(claim.commitment_position)
            .ok_or_else(|| {
                CryptoError::InvalidInput(format!(
                    "no committed attribute at position {}",
                    claim.commitment_position
                ))
            })?;
        if proof.requirements.committed_attributes.get(claim.commitment_position)
            != Some(&opening.index)
        {
            return Err(CryptoError::InvalidInput(
                "commitment secrets do not belong to this proof".into(),
            ));
        }
        let value = decode_date_value(&opening.value)
            .map_err(|e| CryptoError::InvalidInput(e.to_string()))?;
        let statement = range_statement(claim)?;
        let range = Blake3ProofGenerator::prove_range(
            &secrets.transcript,
            &opening.commitment,
            value,
            &opening.salt,
            &statement,
        )?;

        let mut out = EnginePayload::new();
        out.insert(
            "boundaryCommitments".into(),
            payload::encode_list(&range.boundary_commitments),
        );
        out.insert("challenge".into(), payload::encode(&range.challenge));
        out.insert("response".into(), payload::encode(&range.response));
        Ok(out)
    }

    fn range_proof_verify(
        &self,
        parameters: &IssuerParameters,
        proof: &PresentationProof,
        token: &Token,
        claim: &RangeClaim,
        range_payload: &EnginePayload,
    ) -> Result<(), CryptoError> {
        let token = ParsedToken::parse(token)?;
        let commitment =
            committed_commitment(&token, &proof.requirements, claim.commitment_position)?;
        let boundaries = payload::hash_list(range_payload, "boundaryCommitments")?;
        let boundary_commitments: [Hash; 2] = boundaries.try_into().map_err(|_| {
            CryptoError::MalformedPayload("range proof needs two boundary commitments".into())
        })?;
        let range = RangeProof {
            boundary_commitments,
            challenge: payload::hash(range_payload, "challenge")?,
            response: payload::hash(range_payload, "response")?,
        };
        let transcript = proof_transcript(parameters, &token, proof)?;
        Blake3ProofGenerator::verify_range(
            &range,
            &transcript,
            commitment,
            &range_statement(claim)?,
        )
    }

    fn set_membership_proof_generate(
        &self,
        _parameters: &IssuerParameters,
        _proof: &PresentationProof,
        secrets: &CommitmentOpenings,
        claim: &MembershipClaim<'_>,
    ) -> Result<EnginePayload, CryptoError> {
        let opening = secrets
            .openings
            .iter()
            .find(|o| o.index == claim.attribute_index)
            .ok_or_else(|| {
                CryptoError::InvalidInput(format!(
                    "attribute {} is not committed",
                    claim.attribute_index
                ))
            })?;
        let membership = Blake3ProofGenerator::prove_set_membership(
            &secrets.transcript,
            &opening.commitment,
            &opening.value,
            &opening.salt,
            claim.set_values,
        )?;

        let mut out = EnginePayload::new();
        out.insert("setRoot".into(), payload::encode(&membership.set_root));
        out.insert("challenge".into(), payload::encode(&membership.challenge));
        out.insert("response".into(), payload::encode(&membership.response));
        Ok(out)
    }

    fn set_membership_proof_verify(
        &self,
        parameters: &IssuerParameters,
        proof: &PresentationProof,
        token: &Token,
        claim: &MembershipClaim<'_>,
        membership_payload: &EnginePayload,
    ) -> Result<(), CryptoError> {
        let token = ParsedToken::parse(token)?;
        let position = proof
            .requirements
            .committed_position(claim.attribute_index)
            .ok_or_else(|| {
                CryptoError::InvalidInput(format!(
                    "attribute {} is not committed",
                    claim.attribute_index
                ))
            })?;
        let commitment = committed_commitment(&token, &proof.requirements, position)?;
        let membership = SetMembershipProof {
            set_root: payload::hash(membership_payload, "setRoot")?,
            challenge: payload::hash(membership_payload, "challenge")?,
            response: payload::hash(membership_payload, "response")?,
        };
        let transcript = proof_transcript(parameters, &token, proof)?;
        Blake3ProofGenerator::verify_set_membership(
            &membership,
            &transcript,
            commitment,
            claim.set_values,
        )
    }
}
