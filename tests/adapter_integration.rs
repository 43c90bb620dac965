//! End-to-end adapter flows driven through fake backend transports.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bitcoin::absolute::LockTime;
use bitcoin::transaction::Version;
use bitcoin::{
    Address, Amount, OutPoint, Psbt, ScriptBuf, Sequence, Transaction, TxIn, TxOut, WPubkeyHash,
    Witness,
};
use serde_json::{json, Value};
use tokio::sync::{mpsc, Notify};

use walletmux::backend::{
    AddressResponse, BackendEvent, XverseApi, XverseSignRequest, XverseSignResponse,
};
use walletmux::psbt::encode_pair;
use walletmux::backend::OylSignedPsbt;
use walletmux::{
    AddressPurpose, Backend, Balance, Completion, EventBridge, Inscription, LeatherApi,
    LeatherBackend, MemoryStore, MuxError, Network, OylApi, OylBackend, ProviderSession,
    PreferenceStore, RawAddress, SessionHandle, Severity, SignOutcome, SignRequest, StaticProbe,
    UnisatApi, UnisatBackend, WalletMux, XverseBackend, BACKEND_KEY, NETWORK_KEY,
};
use bitcoin::hashes::Hash;

// =============================================================================
// Fixtures
// =============================================================================

fn wpkh_script(tag: u8) -> ScriptBuf {
    ScriptBuf::new_p2wpkh(&WPubkeyHash::from_byte_array([tag; 20]))
}

fn mainnet_address(tag: u8) -> String {
    Address::from_script(&wpkh_script(tag), bitcoin::Network::Bitcoin)
        .unwrap()
        .to_string()
}

/// PSBT whose inputs are funded by the given script tags, in order.
fn funded_psbt(owners: &[u8]) -> Psbt {
    let tx = Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input: owners
            .iter()
            .map(|_| TxIn {
                previous_output: OutPoint::null(),
                script_sig: ScriptBuf::new(),
                sequence: Sequence::MAX,
                witness: Witness::default(),
            })
            .collect(),
        output: vec![TxOut {
            value: Amount::from_sat(1_000),
            script_pubkey: wpkh_script(0xEE),
        }],
    };
    let mut psbt = Psbt::from_unsigned_tx(tx).expect("unsigned tx");
    for (index, owner) in owners.iter().enumerate() {
        psbt.inputs[index].witness_utxo = Some(TxOut {
            value: Amount::from_sat(10_000),
            script_pubkey: wpkh_script(*owner),
        });
    }
    psbt
}

// =============================================================================
// Fake Unisat transport
// =============================================================================

struct FakeUnisat {
    accounts: Vec<String>,
    network: Mutex<String>,
    balance: Balance,
    public_key: String,
    push_txid: String,
    connect_gate: Option<Arc<Notify>>,
    sign_gate: Option<Arc<Notify>>,
    sign_calls: AtomicU32,
    push_calls: AtomicU32,
    switched_to: Mutex<Vec<String>>,
    events: Mutex<Option<mpsc::UnboundedReceiver<BackendEvent>>>,
}

impl FakeUnisat {
    fn new(account: &str, native_network: &str) -> Self {
        Self {
            accounts: vec![account.to_string()],
            network: Mutex::new(native_network.to_string()),
            balance: Balance::new(5_000, 100),
            public_key: "02deadbeef".into(),
            push_txid: "unisat-txid".into(),
            connect_gate: None,
            sign_gate: None,
            sign_calls: AtomicU32::new(0),
            push_calls: AtomicU32::new(0),
            switched_to: Mutex::new(Vec::new()),
            events: Mutex::new(None),
        }
    }

    fn with_events(self) -> (Self, mpsc::UnboundedSender<BackendEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.events.lock().unwrap() = Some(rx);
        (self, tx)
    }
}

#[async_trait]
impl UnisatApi for FakeUnisat {
    async fn request_accounts(&self) -> anyhow::Result<Vec<String>> {
        if let Some(gate) = &self.connect_gate {
            gate.notified().await;
        }
        Ok(self.accounts.clone())
    }

    async fn get_public_key(&self) -> anyhow::Result<String> {
        Ok(self.public_key.clone())
    }

    async fn get_balance(&self) -> anyhow::Result<Balance> {
        Ok(self.balance)
    }

    async fn get_network(&self) -> anyhow::Result<String> {
        Ok(self.network.lock().unwrap().clone())
    }

    async fn switch_network(&self, native: &str) -> anyhow::Result<()> {
        *self.network.lock().unwrap() = native.to_string();
        self.switched_to.lock().unwrap().push(native.to_string());
        Ok(())
    }

    async fn send_bitcoin(&self, _to: &str, _sats: u64) -> anyhow::Result<String> {
        Ok("send-txid".into())
    }

    async fn sign_message(&self, _message: &str) -> anyhow::Result<String> {
        Ok("unisat-signature".into())
    }

    async fn sign_psbt(&self, psbt_hex: &str, _auto_finalize: bool) -> anyhow::Result<String> {
        self.sign_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.sign_gate {
            gate.notified().await;
        }
        // Echo the request back as the "signed" PSBT.
        Ok(psbt_hex.to_string())
    }

    async fn push_psbt(&self, _psbt_hex: &str) -> anyhow::Result<String> {
        self.push_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.push_txid.clone())
    }

    async fn get_inscriptions(&self, _offset: u32, _limit: u32) -> anyhow::Result<Vec<Inscription>> {
        Ok(Vec::new())
    }

    fn subscribe(&self) -> Option<mpsc::UnboundedReceiver<BackendEvent>> {
        self.events.lock().unwrap().take()
    }
}

// =============================================================================
// Fake Xverse transport
// =============================================================================

enum AddressMode {
    Finish(Vec<RawAddress>),
    Cancel,
}

enum SignMode {
    Echo,
    TxidWithStaleBytes(String),
    Cancel,
}

struct FakeXverse {
    address_mode: AddressMode,
    sign_mode: SignMode,
    captured_sign: Mutex<Option<XverseSignRequest>>,
    sign_calls: AtomicU32,
}

impl FakeXverse {
    fn new(address_mode: AddressMode, sign_mode: SignMode) -> Self {
        Self {
            address_mode,
            sign_mode,
            captured_sign: Mutex::new(None),
            sign_calls: AtomicU32::new(0),
        }
    }
}

impl XverseApi for FakeXverse {
    fn request_address(&self, _request: walletmux::backend::AddressRequest, done: Completion<AddressResponse>) {
        match &self.address_mode {
            AddressMode::Finish(addresses) => done.finish(AddressResponse {
                addresses: addresses.clone(),
            }),
            AddressMode::Cancel => done.cancel(),
        }
    }

    fn request_sign(&self, request: XverseSignRequest, done: Completion<XverseSignResponse>) {
        self.sign_calls.fetch_add(1, Ordering::SeqCst);
        let psbt_base64 = request.psbt_base64.clone();
        *self.captured_sign.lock().unwrap() = Some(request);
        match &self.sign_mode {
            SignMode::Echo => done.finish(XverseSignResponse {
                psbt_base64: Some(psbt_base64),
                txid: None,
            }),
            SignMode::TxidWithStaleBytes(txid) => done.finish(XverseSignResponse {
                psbt_base64: Some(psbt_base64),
                txid: Some(txid.clone()),
            }),
            SignMode::Cancel => done.cancel(),
        }
    }
}

fn ordinals_entry(address: &str) -> RawAddress {
    RawAddress {
        address: address.into(),
        public_key: "03aa".into(),
        kind: None,
        purpose: Some(AddressPurpose::Ordinals),
    }
}

fn payment_entry(address: &str) -> RawAddress {
    RawAddress {
        address: address.into(),
        public_key: "03bb".into(),
        kind: None,
        purpose: Some(AddressPurpose::Payment),
    }
}

// =============================================================================
// Fake Oyl transport
// =============================================================================

struct FakeOyl {
    accounts: Vec<String>,
    inscriptions: Vec<Inscription>,
}

impl FakeOyl {
    fn new(account: &str) -> Self {
        Self {
            accounts: vec![account.to_string()],
            inscriptions: vec![Inscription {
                id: "abc123i0".into(),
                number: 42,
                content_type: "image/png".into(),
                content_length: 512,
                output: "abc123:0".into(),
                address: Some(account.to_string()),
            }],
        }
    }
}

#[async_trait]
impl OylApi for FakeOyl {
    async fn request_accounts(&self) -> anyhow::Result<Vec<String>> {
        Ok(self.accounts.clone())
    }

    async fn get_public_key(&self) -> anyhow::Result<String> {
        Ok("02oylkey".into())
    }

    async fn get_balance(&self) -> anyhow::Result<Balance> {
        Ok(Balance::new(900, 0))
    }

    async fn get_inscriptions(&self, _offset: u32, _limit: u32) -> anyhow::Result<Vec<Inscription>> {
        Ok(self.inscriptions.clone())
    }

    async fn sign_psbt(&self, psbt_hex: &str) -> anyhow::Result<OylSignedPsbt> {
        // Echo the request back as the "signed" PSBT.
        Ok(OylSignedPsbt {
            signed_psbt_hex: psbt_hex.to_string(),
            signed_psbt_base64: String::new(),
        })
    }

    async fn push_psbt(&self, _psbt_hex: &str) -> anyhow::Result<String> {
        Ok("oyl-txid".into())
    }
}

// =============================================================================
// Fake Leather transport
// =============================================================================

struct FakeLeather {
    addresses: Value,
}

impl FakeLeather {
    fn new(identity: &str, payment: &str) -> Self {
        Self {
            addresses: json!([
                { "address": identity, "publicKey": "02id", "type": "p2tr" },
                { "address": payment, "publicKey": "02pay", "type": "p2wpkh" },
            ]),
        }
    }
}

#[async_trait]
impl LeatherApi for FakeLeather {
    async fn request(&self, method: &str, _params: Value) -> anyhow::Result<Value> {
        match method {
            "getAddresses" => Ok(json!({ "addresses": self.addresses.clone() })),
            "signMessage" => Ok(json!({ "signature": "leather-signature" })),
            "sendTransfer" => Ok(json!({ "txid": "leather-txid" })),
            other => anyhow::bail!("unknown method {other}"),
        }
    }
}

// =============================================================================
// Harness helpers
// =============================================================================

fn mux_with_unisat(fake: FakeUnisat) -> (WalletMux, Arc<FakeUnisat>, Arc<MemoryStore>) {
    let fake = Arc::new(fake);
    let store = Arc::new(MemoryStore::new());
    let mut mux = WalletMux::new(&StaticProbe::with([Backend::Unisat]), store.clone());
    mux.register(Arc::new(UnisatBackend::new(fake.clone())));
    (mux, fake, store)
}

fn mux_with_xverse(fake: FakeXverse) -> (WalletMux, Arc<FakeXverse>) {
    let fake = Arc::new(fake);
    let mut mux = WalletMux::new(
        &StaticProbe::with([Backend::Xverse]),
        Arc::new(MemoryStore::new()),
    );
    mux.register(Arc::new(XverseBackend::new(fake.clone())));
    (mux, fake)
}

fn mux_with_leather(fake: FakeLeather) -> WalletMux {
    let mut mux = WalletMux::new(
        &StaticProbe::with([Backend::Leather]),
        Arc::new(MemoryStore::new()),
    );
    mux.register(Arc::new(LeatherBackend::new(Arc::new(fake))));
    mux
}

/// Poll until `check` passes or the retry limit runs out.
async fn wait_for(mut check: impl FnMut() -> bool) {
    for _ in 0..500 {
        if check() {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    }
    panic!("condition not reached in time");
}

// =============================================================================
// Connection lifecycle
// =============================================================================

#[tokio::test]
async fn unisat_connect_populates_session_and_preferences() {
    let account = mainnet_address(0x10);
    let (mux, _fake, store) = mux_with_unisat(FakeUnisat::new(&account, "livenet"));

    let session = mux.connect(Backend::Unisat).await.unwrap();
    assert!(session.connected);
    assert!(!session.connecting);
    assert_eq!(session.backend, Some(Backend::Unisat));
    assert_eq!(session.accounts, vec![account.clone()]);
    assert_eq!(session.identity_address, account);
    assert_eq!(session.payment_address, account);
    assert_eq!(session.identity_public_key, "02deadbeef");
    assert_eq!(session.balance, Balance::new(5_000, 100));
    assert_eq!(session.network, Network::Mainnet);

    assert_eq!(store.get(BACKEND_KEY), Some("unisat".into()));
    assert_eq!(store.get(NETWORK_KEY), Some("mainnet".into()));
}

#[tokio::test]
async fn vendor_network_tokens_normalize_to_mainnet() {
    let account = mainnet_address(0x11);
    let (mux, _fake, _store) = mux_with_unisat(FakeUnisat::new(&account, "fractal_mainnet"));
    let session = mux.connect(Backend::Unisat).await.unwrap();
    assert_eq!(session.network, Network::Mainnet);
}

#[tokio::test]
async fn xverse_cancel_rolls_back_to_empty_session() {
    let (mux, _fake) = mux_with_xverse(FakeXverse::new(AddressMode::Cancel, SignMode::Echo));
    let empty = mux.session();

    let err = mux.connect(Backend::Xverse).await.unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(err.severity(), Severity::Info);
    assert_eq!(mux.session(), empty);
}

#[tokio::test]
async fn xverse_role_failure_is_fatal_and_rolls_back() {
    let fake = FakeXverse::new(
        AddressMode::Finish(vec![ordinals_entry(&mainnet_address(0x21))]),
        SignMode::Echo,
    );
    let (mux, _fake) = mux_with_xverse(fake);
    let empty = mux.session();

    let err = mux.connect(Backend::Xverse).await.unwrap_err();
    assert!(matches!(err, MuxError::RoleResolution(_)));
    assert_eq!(mux.session(), empty);
}

#[tokio::test]
async fn xverse_connect_resolves_both_roles() {
    let identity = mainnet_address(0x22);
    let payment = mainnet_address(0x23);
    let fake = FakeXverse::new(
        AddressMode::Finish(vec![ordinals_entry(&identity), payment_entry(&payment)]),
        SignMode::Echo,
    );
    let (mux, _fake) = mux_with_xverse(fake);

    let session = mux.connect(Backend::Xverse).await.unwrap();
    assert_eq!(session.identity_address, identity);
    assert_eq!(session.payment_address, payment);
    assert_eq!(session.identity_public_key, "03aa");
    assert_eq!(session.payment_public_key, "03bb");
    assert_eq!(session.accounts.len(), 2);
}

#[tokio::test]
async fn second_connect_is_rejected_while_first_is_in_flight() {
    let gate = Arc::new(Notify::new());
    let account = mainnet_address(0x12);
    let mut fake = FakeUnisat::new(&account, "livenet");
    fake.connect_gate = Some(gate.clone());
    let (mux, _fake, _store) = mux_with_unisat(fake);
    let mux = Arc::new(mux);

    let first = {
        let mux = mux.clone();
        tokio::spawn(async move { mux.connect(Backend::Unisat).await })
    };
    wait_for(|| mux.session().connecting).await;

    // While connecting, no account data is visible yet.
    let mid_flight = mux.session();
    assert!(mid_flight.connecting);
    assert!(!mid_flight.connected);
    assert!(mid_flight.accounts.is_empty());

    let err = mux.connect(Backend::Unisat).await.unwrap_err();
    assert!(matches!(err, MuxError::Connection { .. }));

    gate.notify_one();
    let session = first.await.unwrap().unwrap();
    assert!(session.connected);
    assert!(!session.accounts.is_empty());
}

#[tokio::test]
async fn reconnect_from_preference_is_best_effort() {
    let account = mainnet_address(0x13);
    let fake = Arc::new(FakeUnisat::new(&account, "livenet"));
    let store = Arc::new(MemoryStore::new());

    let mut first = WalletMux::new(&StaticProbe::with([Backend::Unisat]), store.clone());
    first.register(Arc::new(UnisatBackend::new(fake.clone())));
    first.connect(Backend::Unisat).await.unwrap();
    drop(first);

    // A reloaded host picks the persisted backend back up.
    let mut second = WalletMux::new(&StaticProbe::with([Backend::Unisat]), store.clone());
    second.register(Arc::new(UnisatBackend::new(fake.clone())));
    let session = second.reconnect_from_preference().await.unwrap();
    assert!(session.connected);

    // Disconnect clears the preference; the next reload stays empty.
    second.disconnect();
    assert_eq!(store.get(BACKEND_KEY), None);
    let mut third = WalletMux::new(&StaticProbe::with([Backend::Unisat]), store.clone());
    third.register(Arc::new(UnisatBackend::new(fake)));
    assert!(third.reconnect_from_preference().await.is_none());
    assert!(!third.session().connected);
}

#[tokio::test]
async fn reconnect_failure_is_swallowed_and_leaves_session_empty() {
    let store = Arc::new(MemoryStore::new());
    store.set(BACKEND_KEY, "unisat");
    // Backend not installed anymore: reconnect must not surface an error.
    let mux = WalletMux::new(&StaticProbe::none(), store);
    assert!(mux.reconnect_from_preference().await.is_none());
    assert!(!mux.session().connected);
}

// =============================================================================
// Signing
// =============================================================================

#[tokio::test]
async fn signing_requires_an_active_session_and_makes_no_backend_call() {
    let account = mainnet_address(0x14);
    let (mux, fake, _store) = mux_with_unisat(FakeUnisat::new(&account, "livenet"));

    let request = SignRequest::new(encode_pair(&funded_psbt(&[0x14])).0);
    let err = mux.sign_psbt(&request).await.unwrap_err();
    assert!(matches!(err, MuxError::NoActiveSession));
    assert_eq!(fake.sign_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn xverse_signing_classifies_input_ownership() {
    let identity = mainnet_address(0x02);
    let payment = mainnet_address(0x01);
    let fake = FakeXverse::new(
        AddressMode::Finish(vec![ordinals_entry(&identity), payment_entry(&payment)]),
        SignMode::Echo,
    );
    let (mux, fake) = mux_with_xverse(fake);
    mux.connect(Backend::Xverse).await.unwrap();

    // inputs 0 and 2 funded by the payment address, input 1 by identity
    let psbt = funded_psbt(&[0x01, 0x02, 0x01]);
    let request = SignRequest::new(encode_pair(&psbt).1);
    let outcome = mux.sign_psbt(&request).await.unwrap();

    let captured = fake.captured_sign.lock().unwrap().clone().unwrap();
    assert_eq!(captured.inputs_to_sign.len(), 2);
    assert_eq!(captured.inputs_to_sign[0].address, identity);
    assert_eq!(captured.inputs_to_sign[0].indices, vec![1]);
    assert_eq!(captured.inputs_to_sign[1].address, payment);
    assert_eq!(captured.inputs_to_sign[1].indices, vec![0, 2]);
    assert!(!captured.broadcast);

    let (expected_hex, expected_base64) = encode_pair(&psbt);
    assert_eq!(
        outcome,
        SignOutcome::Signed {
            hex: expected_hex,
            base64: expected_base64
        }
    );
}

#[tokio::test]
async fn reported_txid_supersedes_byte_encodings() {
    let identity = mainnet_address(0x02);
    let payment = mainnet_address(0x01);
    let fake = FakeXverse::new(
        AddressMode::Finish(vec![ordinals_entry(&identity), payment_entry(&payment)]),
        SignMode::TxidWithStaleBytes("broadcast-txid".into()),
    );
    let (mux, _fake) = mux_with_xverse(fake);
    mux.connect(Backend::Xverse).await.unwrap();

    let request = SignRequest::new(encode_pair(&funded_psbt(&[0x01])).1).with_broadcast(true);
    let outcome = mux.sign_psbt(&request).await.unwrap();
    assert_eq!(
        outcome,
        SignOutcome::Broadcast {
            txid: "broadcast-txid".into(),
            hex: None,
            base64: None,
        }
    );
}

#[tokio::test]
async fn xverse_sign_cancel_is_a_clean_terminal_state() {
    let identity = mainnet_address(0x02);
    let payment = mainnet_address(0x01);
    let fake = FakeXverse::new(
        AddressMode::Finish(vec![ordinals_entry(&identity), payment_entry(&payment)]),
        SignMode::Cancel,
    );
    let (mux, _fake) = mux_with_xverse(fake);
    mux.connect(Backend::Xverse).await.unwrap();

    let request = SignRequest::new(encode_pair(&funded_psbt(&[0x01])).1);
    let err = mux.sign_psbt(&request).await.unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(err.severity(), Severity::Info);
}

#[tokio::test]
async fn xverse_sign_without_any_owned_input_is_rejected_before_the_backend() {
    let identity = mainnet_address(0x02);
    let payment = mainnet_address(0x01);
    let fake = FakeXverse::new(
        AddressMode::Finish(vec![ordinals_entry(&identity), payment_entry(&payment)]),
        SignMode::Echo,
    );
    let (mux, fake) = mux_with_xverse(fake);
    mux.connect(Backend::Xverse).await.unwrap();

    // Funded entirely by a stranger.
    let request = SignRequest::new(encode_pair(&funded_psbt(&[0x77, 0x78])).1);
    let err = mux.sign_psbt(&request).await.unwrap_err();
    assert!(matches!(err, MuxError::InsufficientInputData(_)));
    assert_eq!(fake.sign_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unisat_sign_and_broadcast_returns_txid_with_fresh_encodings() {
    let account = mainnet_address(0x15);
    let (mux, fake, _store) = mux_with_unisat(FakeUnisat::new(&account, "livenet"));
    mux.connect(Backend::Unisat).await.unwrap();
    let balance_before = mux.session().balance;

    let psbt = funded_psbt(&[0x15]);
    let request = SignRequest::new(encode_pair(&psbt).0)
        .with_finalize(true)
        .with_broadcast(true);
    let outcome = mux.sign_psbt(&request).await.unwrap();

    let (hex, base64) = encode_pair(&psbt);
    assert_eq!(
        outcome,
        SignOutcome::Broadcast {
            txid: "unisat-txid".into(),
            hex: Some(hex),
            base64: Some(base64),
        }
    );
    assert_eq!(fake.push_calls.load(Ordering::SeqCst), 1);
    // Signing never mutates the session balance.
    assert_eq!(mux.session().balance, balance_before);
}

#[tokio::test]
async fn disconnect_mid_sign_discards_the_stale_result() {
    let gate = Arc::new(Notify::new());
    let account = mainnet_address(0x16);
    let mut fake = FakeUnisat::new(&account, "livenet");
    fake.sign_gate = Some(gate.clone());
    let (mux, fake, _store) = mux_with_unisat(fake);
    let mux = Arc::new(mux);
    mux.connect(Backend::Unisat).await.unwrap();

    let psbt_hex = encode_pair(&funded_psbt(&[0x16])).0;
    let pending = {
        let mux = mux.clone();
        tokio::spawn(async move { mux.sign_psbt(&SignRequest::new(psbt_hex)).await })
    };
    wait_for(|| fake.sign_calls.load(Ordering::SeqCst) == 1).await;

    // The session is replaced underneath the in-flight signing call.
    mux.disconnect();
    gate.notify_one();

    let result = pending.await.unwrap();
    assert!(matches!(result.unwrap_err(), MuxError::NoActiveSession));
}

// =============================================================================
// Capability gaps
// =============================================================================

#[tokio::test]
async fn unsupported_operations_are_uniformly_typed() {
    let identity = mainnet_address(0x31);
    let payment = mainnet_address(0x32);
    let mux = mux_with_leather(FakeLeather::new(&identity, &payment));
    mux.connect(Backend::Leather).await.unwrap();

    // Leather signs messages and sends transfers but has no PSBT or
    // network primitives.
    assert_eq!(mux.sign_message("hi").await.unwrap(), "leather-signature");
    assert_eq!(
        mux.send_bitcoin(&payment, 1_000).await.unwrap(),
        "leather-txid"
    );

    let err = mux.push_psbt("deadbeef").await.unwrap_err();
    assert!(matches!(
        err,
        MuxError::UnsupportedOperation {
            backend: Backend::Leather,
            operation: "pushPsbt"
        }
    ));
    let err = mux.switch_network(Network::Testnet).await.unwrap_err();
    assert!(err.is_unsupported());
    let err = mux
        .sign_psbt(&SignRequest::new(encode_pair(&funded_psbt(&[0x31])).0))
        .await
        .unwrap_err();
    assert!(err.is_unsupported());
}

#[tokio::test]
async fn leather_connect_resolves_roles_from_typed_entries() {
    let identity = mainnet_address(0x33);
    let payment = mainnet_address(0x34);
    let mux = mux_with_leather(FakeLeather::new(&identity, &payment));

    let session = mux.connect(Backend::Leather).await.unwrap();
    assert_eq!(session.identity_address, identity);
    assert_eq!(session.payment_address, payment);
    assert_eq!(session.identity_public_key, "02id");
    assert_eq!(session.payment_public_key, "02pay");
}

#[tokio::test]
async fn oyl_connect_and_sign_pass_through() {
    let account = mainnet_address(0x40);
    let mut mux = WalletMux::new(
        &StaticProbe::with([Backend::Oyl]),
        Arc::new(MemoryStore::new()),
    );
    mux.register(Arc::new(OylBackend::new(Arc::new(FakeOyl::new(&account)))));

    let session = mux.connect(Backend::Oyl).await.unwrap();
    assert_eq!(session.identity_address, account);
    assert_eq!(session.payment_address, account);
    assert_eq!(session.balance, Balance::new(900, 0));

    let psbt = funded_psbt(&[0x40]);
    let outcome = mux
        .sign_psbt(&SignRequest::new(encode_pair(&psbt).0))
        .await
        .unwrap();
    let (hex, base64) = encode_pair(&psbt);
    assert_eq!(outcome, SignOutcome::Signed { hex, base64 });

    assert_eq!(mux.push_psbt("70736274ff").await.unwrap(), "oyl-txid");
    let inscriptions = mux.get_inscriptions(0, 10).await.unwrap();
    assert_eq!(inscriptions.len(), 1);
    assert!(inscriptions[0].is_image());
}

#[tokio::test]
async fn unisat_pass_through_operations() {
    let account = mainnet_address(0x41);
    let (mux, _fake, _store) = mux_with_unisat(FakeUnisat::new(&account, "livenet"));
    mux.connect(Backend::Unisat).await.unwrap();

    assert_eq!(mux.request_accounts().await.unwrap(), vec![account.clone()]);
    assert_eq!(mux.get_network().await.unwrap(), Network::Mainnet);
    assert_eq!(mux.get_public_key().await.unwrap(), "02deadbeef");
    assert_eq!(mux.get_balance().await.unwrap(), Balance::new(5_000, 100));
    assert_eq!(mux.sign_message("hello").await.unwrap(), "unisat-signature");
    assert_eq!(mux.send_bitcoin(&account, 500).await.unwrap(), "send-txid");

    let refreshed = mux.refresh_balance().await.unwrap();
    assert_eq!(mux.session().balance, refreshed);
}

// =============================================================================
// Network switching
// =============================================================================

#[tokio::test]
async fn switch_network_rebuilds_the_whole_session() {
    let account = mainnet_address(0x17);
    let (mux, fake, store) = mux_with_unisat(FakeUnisat::new(&account, "livenet"));
    mux.connect(Backend::Unisat).await.unwrap();

    let session = mux.switch_network(Network::Testnet).await.unwrap();
    assert_eq!(session.network, Network::Testnet);
    assert_eq!(mux.session().network, Network::Testnet);
    assert_eq!(store.get(NETWORK_KEY), Some("testnet".into()));
    assert_eq!(
        fake.switched_to.lock().unwrap().as_slice(),
        &["testnet".to_string()]
    );
}

// =============================================================================
// Event bridge
// =============================================================================

fn connected_session(account: &str, network: Network) -> ProviderSession {
    let mut session = ProviderSession::empty(network);
    session.connected = true;
    session.backend = Some(Backend::Unisat);
    session.accounts = vec![account.to_string()];
    session.identity_address = account.to_string();
    session.payment_address = account.to_string();
    session
}

#[tokio::test]
async fn spurious_account_repeat_is_a_no_op() {
    let account = mainnet_address(0x18);
    let fake = Arc::new(FakeUnisat::new(&account, "livenet"));
    let driver: Arc<dyn walletmux::WalletBackend> = Arc::new(UnisatBackend::new(fake));
    let session = Arc::new(SessionHandle::new(Network::Mainnet));
    let store = Arc::new(MemoryStore::new());
    session.commit(connected_session(&account, Network::Mainnet));
    let before = session.snapshot();

    let bridge = EventBridge::new(driver, session.clone(), store);
    bridge
        .apply(BackendEvent::AccountsChanged(vec![account.clone()]))
        .await;
    assert_eq!(session.snapshot(), before);
}

#[tokio::test]
async fn account_change_repopulates_the_session() {
    let old = mainnet_address(0x18);
    let new = mainnet_address(0x19);
    let fake = Arc::new(FakeUnisat::new(&old, "livenet"));
    let driver: Arc<dyn walletmux::WalletBackend> = Arc::new(UnisatBackend::new(fake));
    let session = Arc::new(SessionHandle::new(Network::Mainnet));
    let store = Arc::new(MemoryStore::new());
    session.commit(connected_session(&old, Network::Mainnet));

    let bridge = EventBridge::new(driver, session.clone(), store);
    bridge
        .apply(BackendEvent::AccountsChanged(vec![new.clone()]))
        .await;

    let snapshot = session.snapshot();
    assert!(snapshot.connected);
    assert_eq!(snapshot.accounts, vec![new.clone()]);
    assert_eq!(snapshot.identity_address, new);
    assert_eq!(snapshot.payment_address, new);
    // Dependent fields were re-derived, not left stale.
    assert_eq!(snapshot.identity_public_key, "02deadbeef");
    assert_eq!(snapshot.balance, Balance::new(5_000, 100));
}

#[tokio::test]
async fn empty_account_list_clears_the_session() {
    let account = mainnet_address(0x18);
    let fake = Arc::new(FakeUnisat::new(&account, "livenet"));
    let driver: Arc<dyn walletmux::WalletBackend> = Arc::new(UnisatBackend::new(fake));
    let session = Arc::new(SessionHandle::new(Network::Mainnet));
    session.commit(connected_session(&account, Network::Mainnet));

    let bridge = EventBridge::new(driver, session.clone(), Arc::new(MemoryStore::new()));
    bridge.apply(BackendEvent::AccountsChanged(Vec::new())).await;

    assert_eq!(session.snapshot(), ProviderSession::empty(Network::Mainnet));
}

#[tokio::test]
async fn network_change_triggers_a_full_refresh() {
    let account = mainnet_address(0x18);
    let fake = Arc::new(FakeUnisat::new(&account, "testnet"));
    let driver: Arc<dyn walletmux::WalletBackend> = Arc::new(UnisatBackend::new(fake));
    let session = Arc::new(SessionHandle::new(Network::Mainnet));
    let store = Arc::new(MemoryStore::new());
    session.commit(connected_session(&account, Network::Mainnet));

    let bridge = EventBridge::new(driver, session.clone(), store.clone());
    bridge
        .apply(BackendEvent::NetworkChanged("testnet".into()))
        .await;

    let snapshot = session.snapshot();
    assert_eq!(snapshot.network, Network::Testnet);
    assert_eq!(snapshot.balance, Balance::new(5_000, 100));
    assert_eq!(store.get(NETWORK_KEY), Some("testnet".into()));
}

#[tokio::test]
async fn subscribed_events_flow_through_the_spawned_bridge() {
    let old = mainnet_address(0x18);
    let new = mainnet_address(0x19);
    let (fake, sender) = FakeUnisat::new(&old, "livenet").with_events();
    let (mux, _fake, _store) = mux_with_unisat(fake);
    let mux = Arc::new(mux);
    mux.connect(Backend::Unisat).await.unwrap();

    sender
        .send(BackendEvent::AccountsChanged(vec![new.clone()]))
        .unwrap();
    let mux_poll = mux.clone();
    wait_for(move || mux_poll.session().identity_address == new).await;
}
