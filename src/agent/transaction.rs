//! Wire encoding for the two transaction shapes the gateway signs: native SOL
//! transfers it builds itself, and prebuilt swap transactions returned by
//! Jupiter that only need the fee payer's signature filled in.

use crate::agent::wallet::Wallet;
use crate::error::{GateError, GateResult};

pub const SYSTEM_PROGRAM_ID: [u8; 32] = [0u8; 32];

const SIGNATURE_LEN: usize = 64;
const SYSTEM_TRANSFER_TAG: u32 = 2;
const VERSIONED_MESSAGE_FLAG: u8 = 0x80;

/// Append `len` in Solana's compact-u16 ("shortvec") encoding.
pub fn encode_compact_u16(len: usize, out: &mut Vec<u8>) {
    let mut rem = len as u16;
    loop {
        let mut byte = (rem & 0x7f) as u8;
        rem >>= 7;
        if rem == 0 {
            out.push(byte);
            break;
        }
        byte |= 0x80;
        out.push(byte);
    }
}

/// Decode a compact-u16 prefix, returning the value and the bytes it used.
pub fn decode_compact_u16(bytes: &[u8]) -> Option<(u16, usize)> {
    let mut value: u32 = 0;
    for (i, byte) in bytes.iter().take(3).enumerate() {
        value |= u32::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            return u16::try_from(value).ok().map(|v| (v, i + 1));
        }
    }
    None
}

/// Legacy message moving `lamports` from `from` to `to` via the system program.
pub fn system_transfer_message(
    from: &[u8; 32],
    to: &[u8; 32],
    lamports: u64,
    recent_blockhash: &[u8; 32],
) -> Vec<u8> {
    let mut message = Vec::with_capacity(150);

    // One signer (the payer), no read-only signers, one read-only account.
    message.extend_from_slice(&[1, 0, 1]);

    encode_compact_u16(3, &mut message);
    message.extend_from_slice(from);
    message.extend_from_slice(to);
    message.extend_from_slice(&SYSTEM_PROGRAM_ID);

    message.extend_from_slice(recent_blockhash);

    let mut data = Vec::with_capacity(12);
    data.extend_from_slice(&SYSTEM_TRANSFER_TAG.to_le_bytes());
    data.extend_from_slice(&lamports.to_le_bytes());

    encode_compact_u16(1, &mut message);
    message.push(2);
    encode_compact_u16(2, &mut message);
    message.extend_from_slice(&[0, 1]);
    encode_compact_u16(data.len(), &mut message);
    message.extend_from_slice(&data);

    message
}

/// Wrap a single-signer message into a signed wire transaction.
pub fn sign_message(wallet: &Wallet, message: &[u8]) -> Vec<u8> {
    let signature = wallet.sign(message);
    let mut tx = Vec::with_capacity(1 + SIGNATURE_LEN + message.len());
    encode_compact_u16(1, &mut tx);
    tx.extend_from_slice(&signature);
    tx.extend_from_slice(message);
    tx
}

/// Fill in the fee payer signature of an already serialized transaction.
///
/// Works for both legacy and v0 messages. The wallet must be the first
/// account key, which is where the payer's signature slot lives.
pub fn sign_serialized(wallet: &Wallet, transaction: &[u8]) -> GateResult<Vec<u8>> {
    let malformed = || GateError::upstream("Malformed transaction returned by swap service");

    let (num_signatures, prefix_len) = decode_compact_u16(transaction).ok_or_else(malformed)?;
    if num_signatures == 0 {
        return Err(malformed());
    }
    let message_start = prefix_len + SIGNATURE_LEN * usize::from(num_signatures);
    let message = transaction.get(message_start..).ok_or_else(malformed)?;

    let mut cursor = 0;
    if message.first().copied().ok_or_else(malformed)? & VERSIONED_MESSAGE_FLAG != 0 {
        cursor += 1;
    }
    let required_signatures = *message.get(cursor).ok_or_else(malformed)?;
    if u16::from(required_signatures) != num_signatures {
        return Err(malformed());
    }
    cursor += 3;

    let (_, keys_len) = decode_compact_u16(message.get(cursor..).ok_or_else(malformed)?)
        .ok_or_else(malformed)?;
    cursor += keys_len;
    let fee_payer = message.get(cursor..cursor + 32).ok_or_else(malformed)?;
    if fee_payer != wallet.public_key() {
        return Err(GateError::upstream(
            "Swap transaction fee payer does not match the configured wallet",
        ));
    }

    let signature = wallet.sign(message);
    let mut signed = transaction.to_vec();
    signed[prefix_len..prefix_len + SIGNATURE_LEN].copy_from_slice(&signature);
    Ok(signed)
}
