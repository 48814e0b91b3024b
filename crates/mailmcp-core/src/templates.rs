//! Canned message templates for the fixed-shape tools.

/// Subject and body baked into a templated tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Template {
    pub subject: &'static str,
    pub body: &'static str,
}

pub const HALLOWEEN_INVITATION: Template = Template {
    subject: "萬聖節邀請 🎃👻",
    body: "嗨！娜娜子姊姊～\n\n萬聖節快到了！想邀請您一起去路上玩，不給糖就搗蛋！🍬\n\n期待您的回覆！",
};

pub const SYSTEM_ALERT: Template = Template {
    subject: "【1399】AI 客服通知 – 系統登入異常警示",
    body: "您好：\n\n\
這封信由 1399 AI 客服系統 自動寄出（請勿直接回覆）。\n\n\
【通知摘要】\n\n\
．事件/工單編號：T20251027-0412\n\
．主旨/類別：系統登入異常 / 平台監控\n\
．目前狀態：待處理（Pending）\n\
．發生/更新時間：2025/10/27 17:25\n\
．客戶/單位：國泰金控 – 新技術研究小組（CATHAY-DT001）\n\n\
【相關內容】\n\n\
在 2025/10/27 17:24，AI 監控系統偵測到多次登入失敗紀錄（5 次以上）\n\
來源 IP：203.75.23.48\n\
帳號：itr_admin\n\
系統：CRM Portal\n\
目前暫未造成服務中斷，但建議檢查是否有暴力破解或帳號異常行為。\n\n\
【需要您執行】\n\n\
1️⃣ 請登入監控平台確認該帳號登入紀錄。\n\
2️⃣ 若為異常登入，請立即凍結該帳號並更改密碼。\n\
3️⃣ 完成後回報至 AI 客服工單系統（工單號：T20251027-0412）。\n\n\
更多詳情請前往：\n\
🔗 1399 客服管理平台\n\n\
—\n\
1399 AI 客服系統\n\
聯絡窗口：王阿明（it.support@1399-ai.example.com / 分機 1399）\n\n\
機密聲明：\n\
本郵件含有機密資訊，僅限指定收件人閱讀。\n\
未經授權，請勿轉寄、揭露或散布本郵件內容。\n    ",
};
