//! Prompt templates for LLM usage.

use crate::base::types::{HistoryEntry, HistoryRole, KnowledgeEntry};

/// System prompt.
pub const ASSISTANT_SYSTEM_DIRECTIVE: &str = r#####"Kamu adalah CS support untuk layanan subscription produk digital (Netflix, YouTube Premium, Disney+, Spotify, dll).
Prioritas: SUPPORT CUSTOMER, bukan jualan. Customer biasanya menanyakan:
1. Kendala teknis (OTP login, password, akun bermasalah)
2. Perpanjangan langganan yang akan expired
3. Jarang yang tanya harga duluan

KAPAN HARUS DEFER KE ADMIN:
- Jika customer EKSPLISIT minta proses order/pembayaran untuk langganan BARU (contoh: "mau order", "mau daftar") → Bilang "Tim admin akan proses"
- JANGAN defer jika customer HANYA tanya harga, fitur produk, atau cek ketersediaan, jawab langsung
- JANGAN defer jika customer tanya spesifikasi produk ("dapat OneDrive?", "bisa berapa device?"), jawab dari knowledge base
- Jika pertanyaan TIDAK JELAS → Tanya spesifik: "Bisa dijelaskan lebih detail?"
- Jika customer sudah bayar/transfer → Bilang "Terima kasih, admin akan cek konfirmasi pembayaran"
- Jika customer tanya hal yang TIDAK ada di knowledge base → Bilang "Saya hubungkan dengan admin ya"

PRODUK YANG TERSEDIA (kategorisasi):
**Streaming Video:**
- Netflix (3 jenis: TV Shared, TV Exclusive, Non TV Access)
- Disney+ Hotstar
- Prime Video
- HBO GO Max

**Music Streaming:**
- YouTube Premium
- Spotify Premium
- Apple Music

**Productivity:**
- Canva Pro
- Microsoft 365 (Personal, Family)
- CapCut Pro

**VPN:**
- VPN Unlimited

FAQ TROUBLESHOOTING:
**Netflix First Login OTP Issue:**
Jawab: "Untuk Netflix first login, jika diminta 4 kode OTP, klik 'Get Help' → lalu klik 'use password instead'. Password sudah saya share sebelumnya."

**Prime Video / Disney+ OTP Issue:**
Jawab: "Untuk first login Prime/Disney+, saya akan bantu kirimkan OTP-nya. Tunggu sebentar ya."

**Perpanjangan Langganan:**
Jawab dengan cek produk dan akun mereka, tanyakan: "Untuk perpanjangan [produk] dengan akun [email], mau diperpanjang berapa lama?"

ATURAN RESPONSE:
1. Deteksi bahasa user (ID/EN) dan jawab dengan bahasa yang sama
2. Kalau tanya "Basic/Premium/Family" → jelaskan kategori produk di atas
3. FORMAT HARGA:
   - Tampilkan sebagai BULLET LIST dengan `-` (tidak boleh numbered)
   - Contoh: `- 1 bulan: *Rp 55.000*` (bold harga)
   - Jika ada promo: `- 1 bulan: ~Rp 76.000~ *Rp 70.000*` (strikethrough normal, bold promo)
   - JANGAN gunakan asterisk di strikethrough: salah `~Rp 76.000*`, benar: `~Rp 76.000~`
4. DILARANG KERAS mengarang atau menghitung harga. Hanya tampilkan harga yang ADA PERSIS di KNOWLEDGE BASE
5. DILARANG menampilkan durasi yang TIDAK ADA di KNOWLEDGE BASE
6. JANGAN sebutkan variant lain yang kosong/SOLD OUT kecuali customer EKSPLISIT tanya
7. Jika durasi yang ditanya tidak ada di data → jawab "Untuk durasi tersebut belum tersedia ka, tersedia [sebutkan hanya yang ada]"
8. Response singkat & to-the-point. JANGAN tambahin closing verbose seperti "Jangan ragu untuk menghubungi!"
9. Kalau tidak jelas, tanya spesifik: "Untuk produk apa kak? Netflix, YouTube, atau yang lain?"
"#####;

/// Appended to the directive on every reply.
pub const HISTORY_ADDENDUM: &str = "GUNAKAN CONVERSATION HISTORY: Sebelum meminta klarifikasi, cek dulu history di atas. Jika context sudah jelas dari percakapan sebelumnya (contoh: user baru tanya harga YouTube lalu bertanya \"bayarnya gimana?\"), JAWAB LANGSUNG menggunakan konteks itu. Jangan tanya ulang produk yang sudah disebutkan dalam history.";

/// Bank and e-wallet details sent when a customer confirms a renewal.
pub const PAYMENT_INSTRUCTIONS: &str = r#####"Siap! Untuk pembayaran dapat ditransfer ke rekening:

*Bank Transfer:*
• *BCA:* 5425141373 a.n. *Suharyadi*
• *BTPN/Jenius:* 90310067177 a.n. Suharyadi
• *BSI:* 1056279373 a.n. Suharyadi
• *Bank Jago Syariah:* 502090301438 (JagoID: hary4di) a.n. *Suharyadi*

*E-Wallet:*
• OVO/GOPAY/DANA: 08128933008

Setelah transfer, mohon konfirmasi ya! 🙏🏻"#####;

/// Vision prompt deciding whether an image is a transfer receipt.
pub const PAYMENT_PROOF_PROMPT: &str = r#####"Analisa screenshot ini dengan DETAIL. Apakah ini bukti transfer/pembayaran bank?
Jika YA, ekstrak SEMUA info: nama bank, nominal/amount, nomor rekening tujuan, nama penerima, waktu transfer, kode/referensi transfer, dan PRODUK YANG DIBELI (jika terlihat: Netflix, Spotify, YouTube, Amazon Prime, Disney, etc).
Jika TIDAK, set is_payment_proof ke false.
Format response sebagai JSON dengan key: is_payment_proof, bank_name, amount, account_number, recipient_name, transaction_time, product, status."#####;

/// Vision prompt for plain text extraction.
pub const IMAGE_TEXT_PROMPT: &str = "Extract semua teks yang terlihat di gambar ini. Jika ada informasi pembayaran/transfer, sebutkan: nominal, nama penerima, bank, nomor rekening. Jika ada pertanyaan tentang produk digital subscription (Netflix, Spotify, YouTube Premium, dll), jelaskan konteksnya. Response dalam bahasa Indonesia.";

/// Guidance injected into the intent prompt, based on how sure we are about the product.
pub fn clarification_guidance(confidence: u8, already_asked: bool, bad_momentum: bool) -> String {
    if confidence >= 80 {
        format!("\n\nNOTA: Confidence score TINGGI ({confidence}%). LANGSUNG JAWAB tanpa perlu tanya ulang!")
    } else if confidence >= 60 {
        format!("\n\nNOTA: Confidence score MEDIUM ({confidence}%). Acknowledge assumption tapi LANGSUNG JAWAB, jangan tanya ulang!")
    } else if already_asked {
        "\n\nNOTA: Bot sudah tanya clarification sebelumnya. LANGSUNG JAWAB dengan asumsi dari history, jangan tanya lagi!".to_string()
    } else if bad_momentum {
        "\n\nNOTA: Momentum percakapan terganggu (3+ short messages). Keep response minimal, jangan tanya clarification!".to_string()
    } else {
        String::new()
    }
}

/// Builds the classifier prompt.
pub fn build_intent_prompt(products: &[String], history: &[HistoryEntry], guidance: &str, message: &str) -> String {
    let product_list = products.join(", ");

    let history_context = if history.is_empty() {
        String::new()
    } else {
        let recent = &history[history.len().saturating_sub(4)..];
        let lines = recent
            .iter()
            .map(|entry| {
                let speaker = match entry.role {
                    HistoryRole::User => "Customer",
                    HistoryRole::Assistant => "Bot",
                };
                let content: String = entry.content.chars().take(150).collect();
                format!("{speaker}: {content}")
            })
            .collect::<Vec<_>>()
            .join("\n");

        format!("\n\nHistory percakapan sebelumnya (gunakan sebagai konteks):\n{lines}")
    };

    format!(
        r#####"Analisa pertanyaan customer service ini dan kategorisasi:

Produk tersedia: {product_list}{history_context}{guidance}

Pesan terbaru customer: "{message}"

PERHATIAN: Gunakan history di atas sebagai konteks. Contoh: jika history bicara soal YouTube Premium dan pesan baru adalah "bayarnya gimana?" atau "transfer kemana?", itu adalah intent "renewal" dengan product "YouTube Premium".

JANGAN PERNAH TANYA PRODUK ULANG jika sudah disebutkan di history atau confidence score tinggi. Lebih baik jawab dengan assumption.

Kategori intent:
1. **troubleshooting** - Masalah OTP, password, login, akun error → {{"intent": "support"}}
2. **renewal** - Mau perpanjang langganan, tanya cara bayar, transfer, konfirmasi bayar → {{"intent": "renewal", "product": "nama produk dari history jika tidak disebutkan"}}
3. **price_inquiry** - Tanya harga spesifik → extract product & duration
4. **availability_inquiry** - Tanya apakah produk tersedia/ada slot/ready/kosong/full → {{"intent": "availability_inquiry", "product": "nama produk"}}
5. **product_info** - Tanya "basic/premium/family", "ada apa aja", kategori produk → {{"intent": "product_catalog"}}
6. **subscription_inquiry** - Tanya "saya langganan apa saja?", "daftar langganan saya" → {{"intent": "subscription_inquiry"}}
7. **greeting** - Halo, hi, salam → {{"intent": "greeting"}}

Response format JSON:
{{
  "intent": "support" | "renewal" | "price_inquiry" | "availability_inquiry" | "product_catalog" | "subscription_inquiry" | "greeting" | "unclear",
  "product": "nama produk atau null",
  "duration": "durasi atau null",
  "issue_type": "otp" | "password" | "login" | null
}}"#####
    )
}

/// Builds the full system message for a reply.
pub fn build_reply_system(directive: &str, customer_name: Option<&str>, knowledge: &[KnowledgeEntry]) -> String {
    let mut system = directive.trim_end().to_string();

    if let Some(name) = customer_name {
        system.push_str(&format!("\n\nNama customer: *{name}* (pelanggan terdaftar). Sapa dengan \"ka *{name}*\" di awal balasan pertama dalam percakapan."));
    }

    system.push_str("\n\n");
    system.push_str(HISTORY_ADDENDUM);

    if !knowledge.is_empty() {
        system.push_str("\n\n**KNOWLEDGE BASE (gunakan ini untuk menjawab):**\n");
        for (idx, entry) in knowledge.iter().enumerate() {
            system.push_str(&format!("\n{}. [{}] {}:\n{}\n", idx + 1, entry.category, entry.topic, entry.content));
        }
    }

    system
}

/// Builds the user turn of a reply, with pricing guidance picked from the knowledge block.
pub fn build_reply_user(message: &str, knowledge: &[KnowledgeEntry]) -> String {
    let has_pricing = knowledge.iter().any(|entry| entry.category.eq_ignore_ascii_case("PRICING"));

    let guidance = if has_pricing {
        r#####"Gunakan data harga dari KNOWLEDGE BASE di atas untuk menjawab. Format: bullet list dengan tanda "-". Contoh:
- 1 bulan: *Rp 55.000*
- 3 bulan: ~Rp 76.000~ *Rp 70.000* (jika ada promo)

Response singkat, jangan verbose. Harus natural, tidak robotic!"#####
    } else {
        r#####"Tidak ada data harga spesifik.
Analisa dulu: Apakah pertanyaan tentang:
1. Troubleshooting/kendala teknis → Jawab sesuai FAQ
2. Tanya kategori produk ("basic/premium/family"?) → Jelaskan kategori streaming/music/productivity
3. Tanya harga tapi tidak spesifik → Tanyakan produk spesifik (jangan list semua, kasih contoh 3-4 saja)
4. Perpanjangan → Tanyakan produk dan akun

Response harus natural, jangan robotic!"#####
    };

    format!("Customer: \"{message}\"\n\n{guidance}")
}

// Tests.
