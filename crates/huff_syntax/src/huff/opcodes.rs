//! EVM opcode mnemonics recognised inside macro bodies

/// Every mnemonic the grammar accepts as an `opcode`, grouped as in the
/// Yellow Paper.
pub const OPCODES: &[&str] = &[
    // arithmetic
    "add", "mul", "sub", "div", "sdiv", "mod", "smod", "addmod", "mulmod", "exp", "signextend",
    // comparison
    "lt", "gt", "slt", "sgt", "eq", "iszero",
    // bitwise
    "and", "or", "xor", "not", "byte", "shl", "shr", "sar",
    "sha3",
    // environment
    "address", "balance", "origin", "caller", "callvalue", "calldataload", "calldatasize",
    "calldatacopy", "codesize", "codecopy", "gasprice", "extcodesize", "extcodecopy",
    "returndatasize", "returndatacopy", "extcodehash",
    // block
    "blockhash", "coinbase", "timestamp", "number", "prevrandao", "gaslimit", "chainid",
    "selfbalance", "basefee", "blobhash", "blobbasefee",
    // control flow
    "stop", "jump", "jumpi", "pc", "gas", "jumpdest",
    // storage
    "sload", "sstore", "tload", "tstore",
    "pop",
    "push0", "push1", "push2", "push3", "push4", "push5", "push6", "push7", "push8", "push9",
    "push10", "push11", "push12", "push13", "push14", "push15", "push16", "push17", "push18",
    "push19", "push20", "push21", "push22", "push23", "push24", "push25", "push26", "push27",
    "push28", "push29", "push30", "push31", "push32",
    "dup1", "dup2", "dup3", "dup4", "dup5", "dup6", "dup7", "dup8", "dup9", "dup10", "dup11",
    "dup12", "dup13", "dup14", "dup15", "dup16",
    "swap1", "swap2", "swap3", "swap4", "swap5", "swap6", "swap7", "swap8", "swap9", "swap10",
    "swap11", "swap12", "swap13", "swap14", "swap15", "swap16",
    // memory
    "mload", "mstore", "mstore8", "msize", "mcopy",
    "log0", "log1", "log2", "log3", "log4",
    // system
    "create", "call", "callcode", "return", "delegatecall", "create2", "staticcall", "revert",
    "selfdestruct",
];

/// True if `text` is an opcode mnemonic.
#[must_use]
pub fn is_opcode(text: &str) -> bool {
    OPCODES.contains(&text)
}
