//! End-to-end deployment scenario: build the Token artifact and exercise it
//! against a local Anvil dev node.

use std::path::Path;

use alloy::{
    network::TransactionBuilder,
    primitives::Address,
    providers::{Provider, ProviderBuilder},
    rpc::types::TransactionRequest,
    sol,
    sol_types::SolConstructor,
};
use token_build::compile::{compile_contract, CompiledContract};

sol! {
    #[sol(rpc)]
    contract Token {
        constructor(string memory initialMessage);

        function message() external view returns (string memory);

        function setMessage(string memory newMessage) external;
    }
}

const TOKEN_SOURCE: &str = "contracts/Token.sol";
const INITIAL_MESSAGE: &str = "Hi there!!";
const DEPLOY_GAS: u64 = 1_000_000;

/// The scenario needs the compiler to build the artifact and the dev node to
/// deploy it.
fn toolchain_installed() -> bool {
    which::which("solc").is_ok() && which::which("anvil").is_ok()
}

/// Creation code for a deployment with the given constructor argument: the
/// compiled bytecode with the ABI encoded argument appended. Constructor
/// arguments are supplied here, at deployment time, never to the compiler.
fn creation_code(compiled: &CompiledContract, initial_message: &str) -> Vec<u8> {
    let mut code = compiled
        .bytecode_bytes()
        .expect("the creation bytecode should be valid hex");
    let constructor = Token::constructorCall {
        initialMessage: initial_message.to_string(),
    };
    code.extend(constructor.abi_encode());
    code
}

/// Compile the fixture and deploy it from the first funded dev account,
/// returning the address of the new contract instance.
async fn deploy(provider: &impl Provider, initial_message: &str) -> Address {
    let compiled =
        compile_contract(Path::new(TOKEN_SOURCE), "Token").expect("the fixture should compile");
    let request = TransactionRequest::default()
        .with_deploy_code(creation_code(&compiled, initial_message))
        .with_gas_limit(DEPLOY_GAS);
    let receipt = provider
        .send_transaction(request)
        .await
        .expect("the deployment should be accepted")
        .get_receipt()
        .await
        .expect("the deployment should be mined");
    receipt
        .contract_address
        .expect("the deployment receipt should carry the contract address")
}

#[tokio::test(flavor = "multi_thread")]
async fn deploys_a_contract() {
    if !toolchain_installed() {
        eprintln!("skipping: `solc` and `anvil` are required");
        return;
    }
    let provider = ProviderBuilder::new().connect_anvil_with_wallet();
    let address = deploy(&provider, INITIAL_MESSAGE).await;
    let code = provider
        .get_code_at(address)
        .await
        .expect("the deployed code should be readable");
    assert!(!code.is_empty(), "the deployed contract should have code");
}

#[tokio::test(flavor = "multi_thread")]
async fn has_a_default_message() {
    if !toolchain_installed() {
        eprintln!("skipping: `solc` and `anvil` are required");
        return;
    }
    let provider = ProviderBuilder::new().connect_anvil_with_wallet();
    let address = deploy(&provider, INITIAL_MESSAGE).await;
    let token = Token::new(address, provider);
    let message = token
        .message()
        .call()
        .await
        .expect("the getter should be callable");
    assert_eq!(message, INITIAL_MESSAGE);
}

#[tokio::test(flavor = "multi_thread")]
async fn can_modify_the_message() {
    if !toolchain_installed() {
        eprintln!("skipping: `solc` and `anvil` are required");
        return;
    }
    let provider = ProviderBuilder::new().connect_anvil_with_wallet();
    let address = deploy(&provider, INITIAL_MESSAGE).await;
    let token = Token::new(address, provider);
    token
        .setMessage("whats poppin".to_string())
        .send()
        .await
        .expect("the setter should be accepted")
        .get_receipt()
        .await
        .expect("the setter should be mined");
    let message = token
        .message()
        .call()
        .await
        .expect("the getter should be callable");
    assert_eq!(message, "whats poppin");
}
