use std::sync::Arc;

use tessera_core::encoding::issuer_encoding_flags;
use tessera_core::wire::{
    self, FirstIssuanceMessage, IssuerParameters, SecondIssuanceMessage, ThirdIssuanceMessage,
};
use tessera_core::{
    AttributeEncoder, Claim, CommunicationError, EncodedClaims, IssuerEvent, IssuerSetupConfig,
    IssuerState, ProtocolError,
};
use tessera_crypto::{CryptoEngine, IssuanceRequest, IssuerKeyAndParameters};
use uuid::Uuid;

/// Issuer side of one issuance exchange.
///
/// Created either from a fresh key ([`IssuanceSession::setup`]) or from a
/// persisted key ([`IssuanceSession::resume`]), then driven through
/// `configure`, `generate_first_message` and `generate_third_message`.
pub struct IssuanceSession<E: CryptoEngine> {
    id: Uuid,
    engine: Arc<E>,
    encoder: AttributeEncoder,
    issuer: IssuerKeyAndParameters,
    state: IssuerState,
    encoded: Option<EncodedClaims>,
    secret: Option<E::IssuanceSecret>,
}

impl<E: CryptoEngine> IssuanceSession<E> {
    /// Generate a new issuer key and parameters.
    pub fn setup(engine: Arc<E>, config: &IssuerSetupConfig) -> Result<Self, CommunicationError> {
        let id = Uuid::now_v7();
        let issuer = config
            .validate()
            .and_then(|()| engine.setup_issuer(config).map_err(ProtocolError::from))
            .map_err(|e| CommunicationError::new(id, "setup", e))?;

        tracing::info!(session = %id, uidp = %config.uidp, "issuer set up");
        Ok(Self::with_issuer(id, engine, issuer))
    }

    /// Resume an issuer from its persisted parameters and private key.
    pub fn resume(
        engine: Arc<E>,
        issuer_parameters_json: &str,
        private_key: &[u8],
    ) -> Result<Self, CommunicationError> {
        let id = Uuid::now_v7();
        let issuer = wire::from_json::<IssuerParameters>(issuer_parameters_json)
            .and_then(|parameters| {
                engine
                    .load_issuer(parameters, private_key)
                    .map_err(|e| ProtocolError::Configuration(e.to_string()))
            })
            .map_err(|e| CommunicationError::new(id, "resume", e))?;

        tracing::info!(session = %id, "issuer resumed");
        Ok(Self::with_issuer(id, engine, issuer))
    }

    fn with_issuer(id: Uuid, engine: Arc<E>, issuer: IssuerKeyAndParameters) -> Self {
        Self {
            id,
            engine,
            encoder: AttributeEncoder::new(),
            issuer,
            state: IssuerState::Created,
            encoded: None,
            secret: None,
        }
    }

    /// Anchor date encoding at a fixed day instead of today.
    pub fn with_encoder(mut self, encoder: AttributeEncoder) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> IssuerState {
        self.state
    }

    /// Issuer private key, for persisting alongside the parameters.
    pub fn private_key(&self) -> &[u8] {
        &self.issuer.private_key
    }

    /// Current issuer parameters, configured or not. Persist these with
    /// [`Self::private_key`] to [`Self::resume`] later.
    pub fn issuer_key_parameters(&self) -> &IssuerParameters {
        &self.issuer.parameters
    }

    /// Encode the claims to issue and bake their encoding flags into the
    /// issuer parameters.
    ///
    /// Claims named in `range_attributes` are direct-encoded so range proofs
    /// can be made over them later; claims named in `date_attributes` are
    /// encoded as dates.
    pub fn configure<S: AsRef<str>>(
        &mut self,
        claims: &[Claim],
        range_attributes: &[S],
        date_attributes: &[S],
    ) -> Result<(), CommunicationError> {
        self.try_configure(claims, range_attributes, date_attributes)
            .map_err(|e| CommunicationError::new(self.id, "configure", e))
    }

    fn try_configure<S: AsRef<str>>(
        &mut self,
        claims: &[Claim],
        range_attributes: &[S],
        date_attributes: &[S],
    ) -> Result<(), ProtocolError> {
        let next = self.state.transition(IssuerEvent::Configure)?;

        let max = self.issuer.parameters.max_number_of_attributes;
        if 2 * claims.len() > max {
            return Err(ProtocolError::Configuration(format!(
                "{} claims need {} attributes, issuer allows {}",
                claims.len(),
                2 * claims.len(),
                max
            )));
        }

        let encoded = self.encoder.encode(claims, date_attributes)?;
        let flags = issuer_encoding_flags(claims, range_attributes);
        let issuer = self
            .engine
            .rebuild_issuer_parameters(&self.issuer, &flags)
            .map_err(|e| ProtocolError::Configuration(e.to_string()))?;

        self.issuer = issuer;
        self.encoded = Some(encoded);
        self.state = next;

        tracing::info!(
            session = %self.id,
            claims = claims.len(),
            range_attributes = range_attributes.len(),
            "issuer configured"
        );
        Ok(())
    }

    /// Snapshot of the issuer parameters with the encoding flags applied.
    pub fn issuer_parameters(&self) -> Result<IssuerParameters, CommunicationError> {
        if self.encoded.is_none() {
            return Err(CommunicationError::new(
                self.id,
                "issuer_parameters",
                ProtocolError::NotConfigured,
            ));
        }
        Ok(self.issuer.parameters.clone())
    }

    /// [`Self::issuer_parameters`] in wire form.
    pub fn issuer_parameters_json(&self) -> Result<String, CommunicationError> {
        let parameters = self.issuer_parameters()?;
        wire::to_json(&parameters)
            .map_err(|e| CommunicationError::new(self.id, "issuer_parameters", e))
    }

    /// First issuance message for `token_count` tokens.
    ///
    /// A device-protected issuer requires the device public key the tokens
    /// will be bound to.
    pub fn generate_first_message(
        &mut self,
        token_count: usize,
        token_information: Option<&[u8]>,
        device_public_key: Option<&[u8]>,
    ) -> Result<FirstIssuanceMessage, CommunicationError> {
        self.try_first_message(token_count, token_information, device_public_key)
            .map_err(|e| CommunicationError::new(self.id, "generate_first_message", e))
    }

    fn try_first_message(
        &mut self,
        token_count: usize,
        token_information: Option<&[u8]>,
        device_public_key: Option<&[u8]>,
    ) -> Result<FirstIssuanceMessage, ProtocolError> {
        let next = self.state.transition(IssuerEvent::SendFirstMessage)?;
        let encoded = self.encoded.as_ref().ok_or(ProtocolError::NotConfigured)?;

        if token_count == 0 {
            return Err(ProtocolError::Configuration(
                "at least one token must be issued".into(),
            ));
        }
        if self.engine.is_device_protected(&self.issuer.parameters) && device_public_key.is_none()
        {
            return Err(ProtocolError::Configuration(
                "issuer is device protected, a device public key is required".into(),
            ));
        }

        let request = IssuanceRequest {
            attributes: encoded.to_attribute_pairs(),
            token_count,
            token_information: token_information.unwrap_or_default().to_vec(),
            device_public_key: device_public_key.map(<[u8]>::to_vec),
        };
        let (message, secret) = self.engine.issuer_first_message(&self.issuer, &request)?;

        self.secret = Some(secret);
        self.state = next;

        tracing::info!(session = %self.id, tokens = token_count, "first issuance message sent");
        Ok(message)
    }

    /// Third issuance message answering the prover's second message.
    pub fn generate_third_message(
        &mut self,
        second: &SecondIssuanceMessage,
    ) -> Result<ThirdIssuanceMessage, CommunicationError> {
        self.try_third_message(second)
            .map_err(|e| CommunicationError::new(self.id, "generate_third_message", e))
    }

    fn try_third_message(
        &mut self,
        second: &SecondIssuanceMessage,
    ) -> Result<ThirdIssuanceMessage, ProtocolError> {
        let next = self.state.transition(IssuerEvent::SendThirdMessage)?;
        let secret = self.secret.as_ref().ok_or(ProtocolError::ProtocolSequence {
            operation: "generate_third_message",
            state: self.state.to_string(),
        })?;

        let message = self
            .engine
            .issuer_third_message(&self.issuer, secret, second)
            .map_err(|e| ProtocolError::TokenGeneration(e.to_string()))?;

        self.secret = None;
        self.state = next;

        tracing::info!(session = %self.id, "third issuance message sent");
        Ok(message)
    }
}
