//! Contract bindings for `CertificatePayment`.
//!
//! The upload call is payable and does not return the assigned id; the id
//! is only observable through the `CertificateUploaded` event.

use alloy::sol;

sol! {
    #[sol(rpc)]
    interface ICertificatePayment {
        event CertificateUploaded(
            uint256 id,
            address indexed user,
            address indexed organization,
            string ipfsHash,
            uint256 fee
        );

        event CertificateVerified(uint256 id, bool accepted, string comment);

        event PaymentTransferred(uint256 id, address indexed recipient, uint256 amount);

        event RefundIssued(uint256 id, address indexed recipient, uint256 amount);

        function uploadCertificate(address _organization, string _ipfsHash) external payable;

        function verifyCertificate(uint256 _id, bool _accepted, string _comment) external;

        function getCertificate(uint256 _id) external view returns (
            uint256 id,
            address user,
            address organization,
            string ipfsHash,
            uint256 fee,
            bool verified,
            bool rejected,
            string comment
        );

        function certificateCount() external view returns (uint256);

        function getContractBalance() external view returns (uint256);

        function owner() external view returns (address);
    }
}
