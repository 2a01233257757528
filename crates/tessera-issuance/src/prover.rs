use std::sync::Arc;

use tessera_core::wire::{
    self, FirstIssuanceMessage, IssuerParameters, KeyAndToken, SecondIssuanceMessage,
    ThirdIssuanceMessage,
};
use tessera_core::{
    AttributeEncoder, Claim, CommunicationError, EncodedClaims, ProtocolError, ProverEvent,
    ProverState,
};
use tessera_crypto::{CryptoEngine, ProverRequest};
use uuid::Uuid;

/// Everything the prover needs before answering a first message.
#[derive(Debug, Clone)]
pub struct ProverInput<'a> {
    /// First issuance message in wire form.
    pub first_message: &'a str,
    /// Issuer parameters in wire form.
    pub issuer_parameters: &'a str,
    /// Prover information field (`pi`).
    pub prover_information: &'a [u8],
    /// Token information field (`ti`) as agreed with the issuer.
    pub token_information: &'a [u8],
    pub token_count: usize,
    /// The prover's own claim values, in the issuer's claim order.
    pub claims: &'a [Claim],
    pub date_attributes: &'a [String],
}

struct Configuration {
    parameters: IssuerParameters,
    first: FirstIssuanceMessage,
    encoded: EncodedClaims,
    prover_information: Vec<u8>,
    token_information: Vec<u8>,
    token_count: usize,
}

/// Prover side of one issuance exchange.
pub struct ProverSession<E: CryptoEngine> {
    id: Uuid,
    engine: Arc<E>,
    encoder: AttributeEncoder,
    state: ProverState,
    configuration: Option<Configuration>,
    secret: Option<E::ProverSecret>,
}

impl<E: CryptoEngine> ProverSession<E> {
    pub fn new(engine: Arc<E>) -> Self {
        Self {
            id: Uuid::now_v7(),
            engine,
            encoder: AttributeEncoder::new(),
            state: ProverState::Created,
            configuration: None,
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

    pub fn state(&self) -> ProverState {
        self.state
    }

    /// Verified issuer parameters, once configured.
    pub fn issuer_parameters(&self) -> Option<&IssuerParameters> {
        self.configuration.as_ref().map(|c| &c.parameters)
    }

    /// Encode the prover's claims and check them against the issuer.
    pub fn configure(&mut self, input: &ProverInput<'_>) -> Result<(), CommunicationError> {
        self.try_configure(input)
            .map_err(|e| CommunicationError::new(self.id, "configure", e))
    }

    fn try_configure(&mut self, input: &ProverInput<'_>) -> Result<(), ProtocolError> {
        let next = self.state.transition(ProverEvent::Configure)?;

        let parameters: IssuerParameters = wire::from_json(input.issuer_parameters)?;
        self.engine
            .verify_issuer_parameters(&parameters)
            .map_err(|e| ProtocolError::Configuration(format!("issuer parameters: {}", e)))?;
        let first: FirstIssuanceMessage = wire::from_json(input.first_message)?;

        let attribute_count = 2 * input.claims.len();
        if attribute_count > parameters.max_number_of_attributes {
            return Err(ProtocolError::Configuration(format!(
                "{} claims need {} attributes, issuer allows {}",
                input.claims.len(),
                attribute_count,
                parameters.max_number_of_attributes
            )));
        }
        if !parameters.e.is_empty() && parameters.e.len() != attribute_count {
            return Err(ProtocolError::Configuration(format!(
                "issuer encodes {} attributes, prover supplied {}",
                parameters.e.len(),
                attribute_count
            )));
        }
        if input.token_count == 0 {
            return Err(ProtocolError::Configuration(
                "at least one token must be requested".into(),
            ));
        }

        let encoded = self.encoder.encode(input.claims, input.date_attributes)?;

        self.configuration = Some(Configuration {
            parameters,
            first,
            encoded,
            prover_information: input.prover_information.to_vec(),
            token_information: input.token_information.to_vec(),
            token_count: input.token_count,
        });
        self.state = next;

        tracing::info!(
            session = %self.id,
            claims = input.claims.len(),
            tokens = input.token_count,
            "prover configured"
        );
        Ok(())
    }

    /// Second issuance message, optionally binding the tokens to a device key.
    pub fn generate_second_message(
        &mut self,
        device_public_key: Option<&[u8]>,
    ) -> Result<SecondIssuanceMessage, CommunicationError> {
        self.try_second_message(device_public_key)
            .map_err(|e| CommunicationError::new(self.id, "generate_second_message", e))
    }

    fn try_second_message(
        &mut self,
        device_public_key: Option<&[u8]>,
    ) -> Result<SecondIssuanceMessage, ProtocolError> {
        let next = self.state.transition(ProverEvent::SendSecondMessage)?;
        let config = self
            .configuration
            .as_ref()
            .ok_or(ProtocolError::NotConfigured)?;

        if self.engine.is_device_protected(&config.parameters) && device_public_key.is_none() {
            return Err(ProtocolError::Configuration(
                "issuer is device protected, a device public key is required".into(),
            ));
        }

        let request = ProverRequest {
            attributes: config.encoded.to_attribute_pairs(),
            token_count: config.token_count,
            token_information: config.token_information.clone(),
            prover_information: config.prover_information.clone(),
            device_public_key: device_public_key.map(<[u8]>::to_vec),
        };
        let (message, secret) =
            self.engine
                .prover_second_message(&config.parameters, &request, &config.first)?;

        self.secret = Some(secret);
        self.state = next;

        tracing::info!(session = %self.id, "second issuance message sent");
        Ok(message)
    }

    /// Second issuance message in wire form.
    pub fn generate_second_message_json(
        &mut self,
        device_public_key: Option<&[u8]>,
    ) -> Result<String, CommunicationError> {
        let message = self.generate_second_message(device_public_key)?;
        wire::to_json(&message)
            .map_err(|e| CommunicationError::new(self.id, "generate_second_message", e))
    }

    /// Finalize the tokens from the issuer's third message.
    ///
    /// `skip_device_validation` skips the device key check and is meant for
    /// testing only.
    pub fn generate_tokens(
        &mut self,
        third_message: &str,
        skip_device_validation: bool,
    ) -> Result<Vec<KeyAndToken>, CommunicationError> {
        self.try_generate_tokens(third_message, skip_device_validation)
            .map_err(|e| CommunicationError::new(self.id, "generate_tokens", e))
    }

    fn try_generate_tokens(
        &mut self,
        third_message: &str,
        skip_device_validation: bool,
    ) -> Result<Vec<KeyAndToken>, ProtocolError> {
        let next = self.state.transition(ProverEvent::IssueTokens)?;
        let config = self
            .configuration
            .as_ref()
            .ok_or(ProtocolError::NotConfigured)?;
        let secret = self.secret.as_ref().ok_or(ProtocolError::ProtocolSequence {
            operation: "generate_tokens",
            state: self.state.to_string(),
        })?;

        let third: ThirdIssuanceMessage = wire::from_json(third_message)
            .map_err(|e| ProtocolError::TokenGeneration(e.to_string()))?;
        let tokens = self
            .engine
            .prover_generate_tokens(&config.parameters, secret, &third, skip_device_validation)
            .map_err(|e| ProtocolError::TokenGeneration(e.to_string()))?;
        if tokens.len() != config.token_count {
            return Err(ProtocolError::TokenGeneration(format!(
                "expected {} tokens, engine produced {}",
                config.token_count,
                tokens.len()
            )));
        }

        self.secret = None;
        self.state = next;

        tracing::info!(session = %self.id, tokens = tokens.len(), "tokens issued");
        Ok(tokens)
    }
}
